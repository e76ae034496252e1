//! Crawler coordinator - main crawl orchestration logic
//!
//! One [`Coordinator`] drives one invocation of a pass:
//! - Restoring (or discarding) the checkpoint of the pass in progress
//! - Fetching pending URLs one at a time until the frontier empties or the
//!   time budget runs out
//! - Feeding fetched pages to the content handlers
//! - Checkpointing on timeout, or finishing the handlers once the pass completes

use crate::config::Config;
use crate::crawler::{FetchOutcome, FetchPolicy, Fetcher, HttpFetcher, LinkExtractor, TolerantScanner};
use crate::handler::{Handler, HandlerContext};
use crate::notify::{ConsoleNotifier, Notifier};
use crate::state::{FrontierState, RetryLedger};
use crate::storage::{open_store, save_json, CheckpointStore, FRONTIER_KEY};
use crate::url::{LinkClass, SitePolicy};
use crate::{Result, SpiderError, UrlError};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Extra checkpoint time reserved per thousand known URLs (seconds)
const RECORDING_PER_THOUSAND: f64 = 0.05;

/// Flags of one invocation
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Crawl even if the sitemap was already written today
    pub force: bool,
    /// Discard every checkpoint before starting
    pub clear: bool,
    /// Deliver notifications; `false` is test mode
    pub notify: bool,
}

/// How an invocation ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunReport {
    /// The pass completed and every handler produced its artifact
    Completed {
        pages: usize,
        external: usize,
        elapsed: Duration,
    },
    /// The time budget ran out; the pass continues with the next invocation
    Checkpointed {
        visited: usize,
        pending: usize,
        elapsed: Duration,
    },
    /// The sitemap was already written today
    UpToDate(String),
}

impl RunReport {
    /// Plain-text result block for the transcript
    pub fn summary(&self) -> String {
        match self {
            Self::Completed {
                pages,
                external,
                elapsed,
            } => format!(
                "Pass completed\nCount of pages: {}\nExternal links: {}\nTime: {:.2}s\n",
                pages,
                external,
                elapsed.as_secs_f64()
            ),
            Self::Checkpointed {
                visited,
                pending,
                elapsed,
            } => format!(
                "Timed out, checkpoint saved\nVisited pages: {}\nPending pages: {}\nTime: {:.2}s\n",
                visited,
                pending,
                elapsed.as_secs_f64()
            ),
            Self::UpToDate(path) => format!("Sitemap {} already created today\n", path),
        }
    }
}

/// What one iteration of the run loop did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// The URL moved to `visited`
    Visited(String),
    /// The URL went to the back of `pending` for another attempt
    Requeued(String),
    /// The URL was dropped from `pending`
    Dropped(String),
    /// The URL was replaced by its redirect target
    Redirected { from: String, to: String },
    /// Nothing was pending
    Exhausted,
}

/// Read-only parts shared with handlers
struct Session {
    config: Config,
    options: RunOptions,
    config_hash: String,
    policy: SitePolicy,
    extractor: Box<dyn LinkExtractor>,
    notifier: Arc<dyn Notifier>,
}

impl Session {
    fn context(&self) -> HandlerContext<'_> {
        HandlerContext {
            config: &self.config,
            policy: &self.policy,
            extractor: self.extractor.as_ref(),
            notifier: self.notifier.as_ref(),
            options: self.options,
            config_hash: &self.config_hash,
        }
    }
}

/// Main crawler coordinator structure
pub struct Coordinator {
    session: Session,
    fetcher: Box<dyn Fetcher>,
    fetch_policy: FetchPolicy,
    store: Box<dyn CheckpointStore>,
    handlers: Vec<Handler>,
    frontier: FrontierState,
    thin_pages: RetryLedger,
    server_errors: RetryLedger,
    redirected: HashSet<String>,
    warnings: Vec<String>,
    started: Instant,
    prepared: bool,
}

impl Coordinator {
    /// Creates a coordinator talking HTTP and writing to the configured database
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `options` - Flags of this invocation
    /// * `config_hash` - Hash of the configuration file, stored with checkpoints
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(SpiderError)` - The HTTP client or the database failed to initialize
    pub fn new(config: Config, options: RunOptions, config_hash: &str) -> Result<Self> {
        let fetcher = HttpFetcher::from_config(&config.user_agent, &config.crawler)?;
        let store = open_store(&config.storage.database_path)?;
        let notifier = ConsoleNotifier::new(&config.host(), &config.notify.email_notify, options.notify);

        Self::with_parts(
            config,
            options,
            config_hash,
            Box::new(fetcher),
            Box::new(store),
            Arc::new(notifier),
        )
    }

    /// Creates a coordinator from explicit collaborators
    pub fn with_parts(
        config: Config,
        options: RunOptions,
        config_hash: &str,
        fetcher: Box<dyn Fetcher>,
        store: Box<dyn CheckpointStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let policy = SitePolicy::from_config(&config)?;
        let fetch_policy = FetchPolicy::from_config(&config.crawler);
        let handlers = Handler::from_config(&config);

        Ok(Self {
            session: Session {
                config,
                options,
                config_hash: config_hash.to_string(),
                policy,
                extractor: Box::new(TolerantScanner::new()),
                notifier,
            },
            fetcher,
            fetch_policy,
            store,
            handlers,
            frontier: FrontierState::new(),
            thin_pages: RetryLedger::new(),
            server_errors: RetryLedger::new(),
            redirected: HashSet::new(),
            warnings: Vec::new(),
            started: Instant::now(),
            prepared: false,
        })
    }

    pub fn frontier(&self) -> &FrontierState {
        &self.frontier
    }

    pub fn store(&self) -> &dyn CheckpointStore {
        self.store.as_ref()
    }

    /// Recoverable problems recorded so far in this invocation
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Runs the invocation to completion or timeout
    ///
    /// Recorded warnings are sent as one digest whatever the outcome.
    ///
    /// # Returns
    ///
    /// * `Ok(RunReport)` - The pass completed, was checkpointed, or was already done today
    /// * `Err(SpiderError)` - A fatal condition stopped the run
    pub async fn run(&mut self) -> Result<RunReport> {
        let result = self.run_pass().await;
        self.send_warnings();

        match result {
            Err(SpiderError::UpToDate(path)) => {
                info!("Sitemap {} already created today, nothing to do", path);
                Ok(RunReport::UpToDate(path))
            }
            other => other,
        }
    }

    async fn run_pass(&mut self) -> Result<RunReport> {
        self.prepare()?;

        let budget = self.budget();
        let delay = self.session.config.crawler.delay();
        info!(
            "Crawling {} with a budget of {:.2}s ({} pending, {} visited)",
            self.session.policy.website,
            budget.as_secs_f64(),
            self.frontier.pending.len(),
            self.frontier.visited.len()
        );

        while !self.frontier.pending.is_empty() {
            if self.started.elapsed() > budget {
                return self.checkpoint();
            }

            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            self.step().await?;
        }

        self.complete()
    }

    /// Restores the pass in progress and seeds an empty frontier
    ///
    /// Handlers load first, so the sitemap freshness checks see the
    /// checkpoint as it was. An expired checkpoint, or any checkpoint when
    /// clearing was requested, is then discarded together with the state
    /// the handlers restored.
    pub fn prepare(&mut self) -> Result<()> {
        if self.prepared {
            return Ok(());
        }

        let checkpoint = self.store.load_record(FRONTIER_KEY)?;
        let existence_hours = self.session.config.crawler.existence_time as i64;
        let expired = checkpoint
            .as_ref()
            .map(|record| record.age_hours(Utc::now()) > existence_hours)
            .unwrap_or(false);

        let ctx = self.session.context();
        for handler in &mut self.handlers {
            handler.load(&ctx, self.store.as_ref())?;
        }

        if self.session.options.clear || expired {
            if expired {
                info!("Checkpoint older than {} hours, starting a new pass", existence_hours);
            } else {
                info!("Clearing checkpoints");
            }
            self.store.clear_checkpoints()?;
            for handler in &mut self.handlers {
                handler.reset();
            }
            self.frontier = FrontierState::new();
        } else if let Some(record) = checkpoint {
            if record.config_hash != self.session.config_hash {
                warn!("Configuration changed since the checkpoint was written");
            }
            self.frontier = record.decode()?;
            info!(
                "Resuming pass: {} visited, {} pending",
                self.frontier.visited.len(),
                self.frontier.pending.len()
            );
        }

        self.frontier.seed(&self.session.policy.website);
        self.prepared = true;
        Ok(())
    }

    /// Crawl time available to this invocation
    ///
    /// The configured recording margin grows with the number of known URLs
    /// so that writing the checkpoint still fits in the script timeout.
    pub fn budget(&self) -> Duration {
        let crawler = &self.session.config.crawler;
        let known = self.frontier.known();

        let mut recording = crawler.recording;
        if known > 1000 {
            recording += known as f64 / 1000.0 * RECORDING_PER_THOUSAND;
        }

        Duration::from_secs_f64((crawler.script_timeout as f64 - recording).max(0.0))
    }

    /// Processes the oldest pending URL
    pub async fn step(&mut self) -> Result<Step> {
        let Some((url, origin)) = self.frontier.next_pending() else {
            return Ok(Step::Exhausted);
        };

        println!("{}. {}", self.frontier.visited.len() + 1, url);

        let outcome = if self.fetch_policy.is_document(&url) {
            FetchOutcome::NotAnalyzed
        } else {
            let result = self.fetcher.fetch(&url).await;
            self.fetch_policy.classify(&url, &origin, result)
        };

        let (content, page_url) = match outcome {
            FetchOutcome::Content { content, final_url } => (content, final_url),
            FetchOutcome::NotAnalyzed => {
                debug!("{} visited without analysis", url);
                self.frontier.mark_visited(&url);
                return Ok(Step::Visited(url));
            }
            FetchOutcome::Redirect { to } => return Ok(self.follow_redirect(url, &origin, &to)),
            FetchOutcome::ServerError { status, message } => {
                if self.server_errors.first_strike(&url) {
                    warn!("{} answered {}, retrying later", url, status);
                    self.frontier.requeue_back(&url);
                    return Ok(Step::Requeued(url));
                }
                self.warn(message);
                self.frontier.drop_pending(&url);
                return Ok(Step::Dropped(url));
            }
            FetchOutcome::Failed(message) => {
                self.warn(message);
                self.frontier.drop_pending(&url);
                return Ok(Step::Dropped(url));
            }
        };

        if page_url != url {
            match self.session.policy.classify_link(&page_url, &url, None) {
                Ok(LinkClass::External(link)) => {
                    debug!("{} was served off site from {}", url, link);
                    self.frontier.record_external(&link, &origin);
                    self.frontier.drop_pending(&url);
                    return Ok(Step::Dropped(url));
                }
                Ok(_) => debug!("{} was served from {}", url, page_url),
                Err(e) => {
                    self.warn(format!("Redirect from {}: {}", url, e));
                    self.frontier.drop_pending(&url);
                    return Ok(Step::Dropped(url));
                }
            }
        }

        let extracted = self.session.extractor.extract(&content);

        let threshold = self.session.config.crawler.thin_content_threshold;
        if threshold > 0 && extracted.links.len() < threshold {
            if !self.thin_pages.first_strike(&url) {
                let notifier = self.session.notifier.as_ref();
                let message = format!("Failed to read page {}\nReceived content:\n{}", url, content);
                error!("Page {} still has fewer than {} links", url, threshold);
                notifier.notify(&message, None, Some(&notifier.error_subject()));
                return Err(SpiderError::ThinContent { url, content });
            }
            warn!(
                "Page {} has only {} links, reading it again later",
                url,
                extracted.links.len()
            );
            self.frontier.requeue_back(&url);
            return Ok(Step::Requeued(url));
        }

        let base = extracted.base.as_deref();
        for raw in &extracted.links {
            match self.session.policy.classify_link(raw, &page_url, base) {
                Ok(LinkClass::Internal(link)) => {
                    self.frontier.discover(&link, &url);
                }
                Ok(LinkClass::External(link)) => self.frontier.record_external(&link, &url),
                Ok(LinkClass::Skipped) => {}
                Err(e @ UrlError::AmbiguousHost { .. }) => {
                    return Err(self.session.notifier.stop(&e.to_string(), true));
                }
                Err(e) => self.warn(e.to_string()),
            }
        }

        self.frontier.mark_visited(&url);

        let ctx = self.session.context();
        for handler in &mut self.handlers {
            if let Err(e) = handler.parse(&ctx, &page_url, &content) {
                warn!("Handler {} failed on {}: {}", handler.name(), url, e);
                self.warnings.push(format!("Page {}: {}", url, e));
            }
        }

        Ok(Step::Visited(url))
    }

    fn follow_redirect(&mut self, url: String, origin: &str, to: &str) -> Step {
        self.redirected.insert(url.clone());

        match self.session.policy.classify_link(to, &url, None) {
            Ok(LinkClass::Internal(target)) if self.redirected.contains(&target) => {
                self.warn(format!(
                    "Redirect loop: {} redirects to {}. Linked from {}",
                    url, target, origin
                ));
            }
            Ok(LinkClass::Internal(target)) => {
                debug!("{} redirects to {}", url, target);
                self.frontier.redirect(&url, &target);
                return Step::Redirected { from: url, to: target };
            }
            Ok(LinkClass::External(link)) => {
                debug!("{} redirects off site to {}", url, link);
                self.frontier.record_external(&link, origin);
            }
            Ok(LinkClass::Skipped) => {
                debug!("{} redirects to skipped {}", url, to);
            }
            Err(e) => self.warn(format!("Redirect from {}: {}", url, e)),
        }

        self.frontier.drop_pending(&url);
        Step::Dropped(url)
    }

    /// Persists the frontier and partial handler state
    fn checkpoint(&mut self) -> Result<RunReport> {
        save_json(
            self.store.as_mut(),
            FRONTIER_KEY,
            &self.frontier,
            &self.session.config_hash,
        )?;

        let ctx = self.session.context();
        for handler in &self.handlers {
            handler.save(&ctx, self.store.as_mut())?;
        }

        let report = RunReport::Checkpointed {
            visited: self.frontier.visited.len(),
            pending: self.frontier.pending.len(),
            elapsed: self.started.elapsed(),
        };
        info!("Time budget exhausted, checkpoint saved");
        Ok(report)
    }

    /// Produces the artifacts of a completed pass
    fn complete(&mut self) -> Result<RunReport> {
        let visited = self.frontier.visited.len();

        if visited < 2 {
            let notifier = self.session.notifier.as_ref();
            let listing: Vec<&str> = self.frontier.visited.iter().map(String::as_str).collect();
            notifier.notify(
                &format!(
                    "Attempted to write to the sitemap instead of a list of links:\n{}",
                    listing.join("\n")
                ),
                None,
                None,
            );

            let message = format!("Only {} page(s) available for the sitemap", visited);
            error!("{}", message);
            notifier.notify(&message, None, Some(&notifier.error_subject()));

            self.store.clear_checkpoints()?;
            return Err(SpiderError::InsufficientResults(visited));
        }

        let ctx = self.session.context();
        for handler in &mut self.handlers {
            debug!("Finishing handler {}", handler.name());
            handler.finish(&ctx, self.store.as_mut(), &self.frontier)?;
        }

        self.store.delete_record(FRONTIER_KEY)?;

        let report = RunReport::Completed {
            pages: visited,
            external: self.frontier.external.len(),
            elapsed: self.started.elapsed(),
        };
        info!("Pass completed with {} pages", visited);
        Ok(report)
    }

    fn warn(&mut self, message: String) {
        warn!("{}", message);
        self.warnings.push(message);
    }

    /// Sends all recorded warnings as one notification
    fn send_warnings(&mut self) {
        if self.warnings.is_empty() {
            return;
        }

        let notifier = self.session.notifier.as_ref();
        notifier.notify(
            &self.warnings.join("\n\n"),
            None,
            Some(&notifier.error_subject()),
        );
        self.warnings.clear();
    }
}
