use anyhow::Context as _;
use rayon::prelude::*;
use std::io::Read as _;
use wtdom::{
    Document, Original,
    config::CONFIG,
    dom::HtmlOptions,
    env::{Env, LogObserver, NoTemplates, Options},
    ext::Registry,
    wikitext::OffsetType,
};

/// What to convert.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Mode {
    /// Wikitext to HTML with inline round-trip data.
    WtToHtml,
    /// HTML to wikitext, written from scratch.
    HtmlToWt,
    /// Edited HTML to wikitext, reusing the original source.
    Selser,
    /// Wikitext to a page bundle.
    Bundle,
}

impl core::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wt2html" => Ok(Self::WtToHtml),
            "html2wt" => Ok(Self::HtmlToWt),
            "selser" => Ok(Self::Selser),
            "bundle" => Ok(Self::Bundle),
            _ => Err(format!("unknown mode '{s}'")),
        }
    }
}

/// The original document of a selser conversion.
struct OriginalInput {
    html: String,
    source: String,
}

fn usage<T>(err: &str) -> anyhow::Result<T> {
    let exe = std::env::args().next().unwrap_or_default();
    println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    println!("Usage: {exe} <wt2html|html2wt|selser|bundle> [options]\n");
    println!("Options:");
    println!("    --input FILE: Input file, may be repeated (default: stdin)");
    println!("    --original-html FILE: Original HTML with inline data (selser)");
    println!("    --original-wt FILE: Original wikitext (selser)");
    println!("    --offset-type TYPE: byte, ucs2, or char (default: byte)");
    println!("    --variant CODE: Language variant to show\n");
    Err(anyhow::Error::msg(err.to_string()))
}

fn read(path: Option<&str>) -> anyhow::Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("could not read {path}")),
        None => {
            let mut input = String::new();
            std::io::stdin().read_to_string(&mut input)?;
            Ok(input)
        }
    }
}

/// Converts one input.
fn convert(mode: Mode, options: Options, input: &str, original: Option<&OriginalInput>) -> anyhow::Result<String> {
    let registry = Registry::with_builtins();
    let observer = LogObserver;
    let env = Env::new(&CONFIG, &registry, &NoTemplates, &observer, options);

    Ok(match mode {
        Mode::WtToHtml => wtdom::wikitext_to_dom(&env, input)?.to_html(&HtmlOptions { inline_data: true }),
        Mode::HtmlToWt => wtdom::dom_to_wikitext(&env, &Document::from_html(input)?, None)?,
        Mode::Selser => {
            let original = original.context("selser needs --original-html and --original-wt")?;
            let doc = Document::from_html(&original.html)?;
            let original = Original {
                doc: &doc,
                source: &original.source,
            };
            wtdom::dom_to_wikitext(&env, &Document::from_html(input)?, Some(&original))?
        }
        Mode::Bundle => {
            let doc = wtdom::wikitext_to_dom(&env, input)?;
            let bundle = doc.to_page_bundle(input, env.options.offset_type);
            serde_json::to_string_pretty(&bundle)?
        }
    })
}

fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("warn"));

    let mut args = pico_args::Arguments::from_env();
    if args.contains(["-h", "--help"]) {
        return usage("");
    }
    let inputs = args.values_from_str::<_, String>("--input")?;
    let original_html = args.opt_value_from_str::<_, String>("--original-html")?;
    let original_wt = args.opt_value_from_str::<_, String>("--original-wt")?;
    let offset_type = args
        .opt_value_from_fn("--offset-type", |value| {
            serde_json::from_value::<OffsetType>(serde_json::Value::String(value.to_string()))
        })?
        .unwrap_or_default();
    let target_variant = args.opt_value_from_str::<_, String>("--variant")?;
    let Some(mode) = args.opt_free_from_str::<Mode>()? else {
        return usage("Missing mode argument");
    };
    if !args.finish().is_empty() {
        return usage("Unknown extra arguments passed");
    }

    let original = match (original_html, original_wt) {
        (Some(html), Some(source)) => Some(OriginalInput {
            html: read(Some(&html))?,
            source: read(Some(&source))?,
        }),
        (None, None) => None,
        _ => return usage("--original-html and --original-wt go together"),
    };

    let options = |title: &str| Options {
        title: title.to_string(),
        offset_type,
        target_variant: target_variant.clone(),
        ..Options::default()
    };

    if inputs.is_empty() {
        let input = read(None)?;
        println!("{}", convert(mode, options("Main Page"), &input, original.as_ref())?);
        return Ok(());
    }

    let results = inputs
        .par_iter()
        .map(|path| {
            let input = read(Some(path))?;
            let title = std::path::Path::new(path)
                .file_stem()
                .map_or_else(|| path.clone(), |stem| stem.to_string_lossy().into_owned());
            convert(mode, options(&title), &input, original.as_ref())
                .with_context(|| format!("could not convert {path}"))
        })
        .collect::<Vec<_>>();

    let many = inputs.len() > 1;
    for (path, result) in inputs.iter().zip(results) {
        if many {
            println!("==> {path} <==");
        }
        println!("{}", result?);
    }
    Ok(())
}
