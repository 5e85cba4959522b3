// The engine facade handed to the front end.
//
// `Legym` bundles one logged-in session with the last fetched catalog and
// the run simulator. Every operation borrows the same session; a failed
// command leaves it usable for the next one.

use crate::activity::{Activity, ActivityCatalog, ActivityState};
use crate::api::{ApiClient, Transport};
use crate::config::Config;
use crate::error::Result;
use crate::registration::{self, SignUpOutcome};
use crate::running::{self, RunReport, RunSimulator, RunningLimits};
use crate::session::Session;
use crate::trace::TraceGenerator;
use std::collections::BTreeMap;

pub struct Legym<T: Transport = ApiClient> {
    session: Session<T>,
    config: Config,
    catalog: Option<ActivityCatalog>,
    simulator: RunSimulator,
}

impl<T: Transport> std::fmt::Debug for Legym<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Legym")
            .field("session", &self.session)
            .field("config", &self.config)
            .field("catalog", &self.catalog)
            .finish_non_exhaustive()
    }
}

impl Legym<ApiClient> {
    /// Log in over HTTP using `config`.
    pub fn connect(config: Config, username: &str, password: &str) -> Result<Self> {
        let client = ApiClient::new(&config)?;
        Self::login(client, config, username, password)
    }
}

impl<T: Transport> Legym<T> {
    /// Authenticate, then load the semester and running limits the run
    /// simulator needs.
    pub fn login(transport: T, config: Config, username: &str, password: &str) -> Result<Self> {
        let session = Session::login(transport, username, password)?;
        let semester_id = running::fetch_semester_id(&session, &config.retry)?;
        let limits = RunningLimits::fetch(&session, &semester_id, &config.retry, &config.default_limits)?;
        tracing::debug!(?limits, semester_id = %semester_id, "Running limits loaded");

        let simulator = RunSimulator::new(
            TraceGenerator::new(config.pace.clone(), config.track.clone()),
            config.retry.clone(),
            config.batch_size,
            limits,
            semester_id,
            config.seed,
        );
        Ok(Self {
            session,
            config,
            catalog: None,
            simulator,
        })
    }

    /// `(display name, school name)` of the logged-in user.
    pub fn identity(&self) -> (&str, &str) {
        (self.session.display_name(), self.session.school_name())
    }

    pub fn session(&self) -> &Session<T> {
        &self.session
    }

    pub fn running_limits(&self) -> &RunningLimits {
        self.simulator.limits()
    }

    /// Fetch and classify the activity list, replacing the cached snapshot.
    pub fn list_activities(&mut self) -> Result<&ActivityCatalog> {
        let catalog = self.fetch_catalog()?;
        Ok(self.catalog.insert(catalog))
    }

    /// Last fetched snapshot, if any. Never triggers a fetch.
    pub fn catalog(&self) -> Option<&ActivityCatalog> {
        self.catalog.as_ref()
    }

    /// Activities in `state` according to the last snapshot.
    pub fn filter_by_state(&self, state: ActivityState) -> impl Iterator<Item = &Activity> + '_ {
        self.catalog
            .iter()
            .flat_map(move |catalog| catalog.filter_by_state(state))
    }

    /// Register for one activity; see [`registration::sign_up`].
    pub fn sign_up(&mut self, selector: Option<&str>) -> Result<SignUpOutcome> {
        let catalog = self.fetch_catalog()?;
        let outcome = registration::sign_up(&self.session, &catalog, selector);
        self.catalog = Some(catalog);
        let outcome = outcome?;
        self.refresh_after("sign-up");
        Ok(outcome)
    }

    /// Check in to every registered activity; see [`registration::sign_in`].
    pub fn sign_in(&mut self) -> Result<BTreeMap<String, String>> {
        let catalog = self.fetch_catalog()?;
        let results = registration::sign_in(&self.session, &catalog);
        self.catalog = Some(catalog);
        let results = results?;
        self.refresh_after("sign-in");
        Ok(results)
    }

    /// Synthesize and upload one run of `target_km` (default: daily mileage).
    pub fn running(&mut self, target_km: Option<f64>) -> Result<RunReport> {
        self.simulator.submit(&self.session, target_km)
    }

    fn fetch_catalog(&self) -> Result<ActivityCatalog> {
        self.config
            .retry
            .run("activity list", || ActivityCatalog::fetch(&self.session))
    }

    fn refresh_after(&mut self, action: &str) {
        if let Err(err) = self.list_activities() {
            tracing::warn!(action, error = %err, "Catalog refresh after action failed");
        }
    }
}
