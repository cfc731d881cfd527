//! Per-request environment: configuration, host capabilities, options, and
//! the diagnostics observer.

use crate::{
    ext::Registry,
    wikitext::{Configuration, FileMap, OffsetType, Span, Tokenizer},
};
use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

/// Host data access.
pub trait DataAccess: Sync {
    /// Returns the wikitext of the page `title`, or `None` if it does not
    /// exist.
    fn fetch_template(&self, title: &str) -> Option<String>;
}

/// Data access for hosts with no templates.
#[derive(Debug, Default)]
pub struct NoTemplates;

impl DataAccess for NoTemplates {
    fn fetch_template(&self, _: &str) -> Option<String> {
        None
    }
}

/// Data access backed by an in-memory map of page titles to wikitext.
#[derive(Debug, Default)]
pub struct TemplateMap(pub HashMap<String, String>);

impl DataAccess for TemplateMap {
    fn fetch_template(&self, title: &str) -> Option<String> {
        self.0.get(title).cloned()
    }
}

/// How to pick the shown text of language variant markup when no target
/// variant is requested.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum GuesserKind {
    /// Counts variant codes in the page’s markup.
    #[default]
    Markup,
    /// Counts characters of each variant’s script in the page text.
    Script,
}

impl core::str::FromStr for GuesserKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "markup" => Ok(Self::Markup),
            "script" => Ok(Self::Script),
            _ => Err(format!("unknown variant guesser '{s}'")),
        }
    }
}

/// Per-request options.
#[derive(Clone, Debug)]
pub struct Options {
    /// The title of the page being converted.
    pub title: String,
    /// The page id, used for lint sampling.
    pub page_id: u64,
    /// Lints are recorded for one in every `lint_sample_rate` pages. Zero
    /// disables lints.
    pub lint_sample_rate: u64,
    /// The unit of exported source ranges.
    pub offset_type: OffsetType,
    /// The maximum template nesting depth.
    pub max_depth: usize,
    /// The language variant to show, if any.
    pub target_variant: Option<String>,
    /// The variant guessing strategy used when there is no target variant.
    pub variant_guesser: GuesserKind,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            title: "Main Page".to_string(),
            page_id: 0,
            lint_sample_rate: 1,
            offset_type: OffsetType::Byte,
            max_depth: 40,
            target_variant: None,
            variant_guesser: GuesserKind::Markup,
        }
    }
}

/// A diagnostic event.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Event {
    /// A problem in the page source.
    Lint {
        /// The kind of problem.
        kind: &'static str,
        /// The source range, in the requested offset type.
        range: Option<(usize, usize)>,
        /// A description.
        message: String,
    },
    /// A stage could not process something and fell back to a degraded
    /// rendering.
    Degraded {
        /// The stage.
        stage: &'static str,
        /// A description.
        message: String,
    },
}

/// Identifies the page a request is for.
#[derive(Clone, Copy, Debug)]
pub struct Page<'a> {
    /// The page title.
    pub title: &'a str,
    /// The page id.
    pub id: u64,
    /// The lint sampling rate.
    pub sample_rate: u64,
}

impl Page<'_> {
    /// Returns true if lints for this page are sampled.
    pub fn is_sampled(&self) -> bool {
        self.sample_rate != 0 && self.id % self.sample_rate == 0
    }
}

/// Receives diagnostic events. One observer may serve several requests at
/// once, so every event comes with the page it is for.
pub trait Observer: Sync {
    /// Called once at the start of a request.
    fn init(&self, _page: &Page<'_>) {}
    /// Records an event.
    fn record(&self, page: &Page<'_>, event: Event);
    /// Called once at the end of a request, including when it fails.
    fn flush(&self) {}
}

/// An observer which forwards every event to the `log` facade.
#[derive(Debug, Default)]
pub struct LogObserver;

impl Observer for LogObserver {
    fn record(&self, page: &Page<'_>, event: Event) {
        match event {
            Event::Lint { kind, range, message } => {
                log::info!("{}: lint {kind} at {range:?}: {message}", page.title);
            }
            Event::Degraded { stage, message } => {
                log::warn!("{}: {stage}: {message}", page.title);
            }
        }
    }
}

/// An observer which keeps events in memory.
#[derive(Debug, Default)]
pub struct Collector {
    /// Recorded events.
    events: Mutex<Vec<Event>>,
}

impl Collector {
    /// Takes every event recorded so far.
    pub fn take(&self) -> Vec<Event> {
        core::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl Observer for Collector {
    fn record(&self, _: &Page<'_>, event: Event) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

/// An observer which forwards lints only for pages selected by page id and
/// sampling rate. Degradations are always forwarded.
#[derive(Debug)]
pub struct Sampled<O> {
    /// The wrapped observer.
    inner: O,
}

impl<O> Sampled<O> {
    /// Wraps `inner`.
    pub fn new(inner: O) -> Self {
        Self { inner }
    }

    /// The wrapped observer.
    pub fn inner(&self) -> &O {
        &self.inner
    }
}

impl<O: Observer> Observer for Sampled<O> {
    fn init(&self, page: &Page<'_>) {
        self.inner.init(page);
    }

    fn record(&self, page: &Page<'_>, event: Event) {
        if matches!(event, Event::Degraded { .. }) || page.is_sampled() {
            self.inner.record(page, event);
        }
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

/// The environment shared by every request to one wiki.
pub struct Env<'a> {
    /// The site configuration.
    pub config: &'a Configuration,
    /// Extension tag handlers.
    pub registry: &'a Registry,
    /// Host data access.
    pub data_access: &'a dyn DataAccess,
    /// Per-request options.
    pub options: Options,
    /// The diagnostics observer.
    observer: &'a dyn Observer,
    /// The tokenizer, which knows every registered extension tag.
    tokenizer: Tokenizer<'a>,
}

impl core::fmt::Debug for Env<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Env")
            .field("registry", &self.registry)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<'a> Env<'a> {
    /// Creates a new environment.
    pub fn new(
        config: &'a Configuration,
        registry: &'a Registry,
        data_access: &'a dyn DataAccess,
        observer: &'a dyn Observer,
        options: Options,
    ) -> Self {
        Self {
            config,
            registry,
            data_access,
            options,
            observer,
            tokenizer: Tokenizer::new(config).with_extension_tags(registry.names()),
        }
    }

    /// The tokenizer for this wiki.
    #[inline]
    pub fn tokenizer(&self) -> &Tokenizer<'a> {
        &self.tokenizer
    }

    /// The diagnostics observer.
    #[inline]
    pub fn observer(&self) -> &'a dyn Observer {
        self.observer
    }

    /// The page this environment converts.
    pub fn page(&self) -> Page<'_> {
        Page {
            title: &self.options.title,
            id: self.options.page_id,
            sample_rate: self.options.lint_sample_rate,
        }
    }

    /// Records a degradation.
    pub fn degrade(&self, stage: &'static str, message: impl Into<String>) {
        let message = message.into();
        log::debug!("{stage}: {message}");
        self.observer.record(&self.page(), Event::Degraded { stage, message });
    }
}

/// The state of a single wikitext to DOM conversion.
pub struct Session<'a> {
    /// The environment.
    pub env: &'a Env<'a>,
    /// The page source.
    source: FileMap<'a>,
}

impl<'a> Session<'a> {
    /// Creates a session for converting `source`.
    pub fn new(env: &'a Env<'a>, source: &'a str) -> Self {
        Self {
            env,
            source: FileMap::new(source),
        }
    }

    /// Initialises the observer for this page. The returned guard flushes
    /// the observer when it is dropped.
    pub fn begin(&self) -> scopeguard::ScopeGuard<&'a dyn Observer, fn(&'a dyn Observer)> {
        self.env.observer.init(&self.env.page());
        scopeguard::guard(self.env.observer, |observer| observer.flush())
    }

    /// The page source.
    #[inline]
    pub fn source(&self) -> &FileMap<'a> {
        &self.source
    }

    /// Records a lint for the page source range `range`.
    pub fn lint(&self, kind: &'static str, range: Option<Span>, message: impl Into<String>) {
        let to = self.env.options.offset_type;
        let range = range.map(|range| {
            let mut offsets = [range.start, range.end];
            self.source.convert_offsets(&mut offsets, to);
            (offsets[0], offsets[1])
        });
        self.env.observer.record(
            &self.env.page(),
            Event::Lint {
                kind,
                range,
                message: message.into(),
            },
        );
    }

    /// Records a degradation.
    #[inline]
    pub fn degrade(&self, stage: &'static str, message: impl Into<String>) {
        self.env.degrade(stage, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CONFIG;

    #[test]
    fn lint_offsets() {
        let registry = Registry::default();
        let collector = Collector::default();
        let options = Options {
            offset_type: OffsetType::Char,
            ..Default::default()
        };
        let env = Env::new(&CONFIG, &registry, &NoTemplates, &collector, options);
        let session = Session::new(&env, "ää<b>");
        session.lint("missing-end-tag", Some(Span::new(4, 7)), "b");
        assert_eq!(
            collector.take(),
            [Event::Lint {
                kind: "missing-end-tag",
                range: Some((2, 5)),
                message: "b".into()
            }]
        );
    }

    #[test]
    fn sampling() {
        let sampled = Sampled::new(Collector::default());
        let odd = Page {
            title: "A",
            id: 3,
            sample_rate: 2,
        };
        let even = Page {
            title: "B",
            id: 4,
            sample_rate: 2,
        };
        let lint = || Event::Lint {
            kind: "x",
            range: None,
            message: String::new(),
        };

        sampled.init(&odd);
        sampled.init(&even);
        sampled.record(&odd, lint());
        sampled.record(
            &odd,
            Event::Degraded {
                stage: "y",
                message: String::new(),
            },
        );
        assert_eq!(sampled.inner().take().len(), 1);

        sampled.record(&even, lint());
        sampled.init(&odd);
        sampled.record(&even, lint());
        assert_eq!(sampled.inner().take().len(), 2);
        assert!(!Page { sample_rate: 0, ..even }.is_sampled());
    }
}
