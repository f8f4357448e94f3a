//! ---
//! ems_section: "05-networking-external-interfaces"
//! ems_subsection: "binary"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Intake subcommands driving the orchestrator from the terminal."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use ems_client::HttpBackend;
use ems_common::{AppConfig, LocationConfig};
use ems_intake::{
    cache, IntakeOrchestrator, IntakeSettings, RequestOutcome, RestoreResult, SessionRehydrator,
    Step,
};
use ems_location::{
    AcquisitionPolicy, FixedDevice, LocationDevice, LocationEvent, LocationSource,
    UnsupportedDevice,
};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::console::{ConsolePresenter, Output};

const COOKIE_FILE: &str = "session.cookie";

#[derive(Debug, Args)]
pub struct SubmitArgs {
    #[arg(long, short, help = "Description of the emergency")]
    pub message: String,
    #[arg(long, requires = "lng", allow_hyphen_values = true, help = "Manual latitude")]
    pub lat: Option<f64>,
    #[arg(long, requires = "lat", allow_hyphen_values = true, help = "Manual longitude")]
    pub lng: Option<f64>,
}

#[derive(Debug, Args)]
pub struct ReserveArgs {
    #[arg(
        long,
        short,
        help = "Description of the emergency; omit to reserve from the restored session"
    )]
    pub message: Option<String>,
    #[arg(long, help = "Hospital to reserve at; defaults to the nearest one listed")]
    pub hospital: Option<String>,
    #[arg(long, requires = "lng", allow_hyphen_values = true, help = "Manual latitude")]
    pub lat: Option<f64>,
    #[arg(long, requires = "lat", allow_hyphen_values = true, help = "Manual longitude")]
    pub lng: Option<f64>,
}

/// One orchestrator wired to the HTTP backend for the duration of a command.
struct Intake {
    orchestrator: IntakeOrchestrator,
    rehydrator: SessionRehydrator,
    backend: HttpBackend,
    cookie_path: PathBuf,
    location_wait: Duration,
}

impl Intake {
    fn build(config: &AppConfig) -> Result<Self> {
        let backend = HttpBackend::from_config(&config.backend)?;
        let cookie_path = config.cache.directory.join(COOKIE_FILE);
        match fs::read_to_string(&cookie_path) {
            Ok(saved) => backend.transport().restore_cookies(saved.trim()),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => warn!(
                path = %cookie_path.display(),
                error = %err,
                "ignoring unreadable session cookie"
            ),
        }

        let device: Arc<dyn LocationDevice> =
            match config.location.fixed.as_ref().and_then(FixedDevice::from_config) {
                Some(device) => Arc::new(device),
                None => Arc::new(UnsupportedDevice),
            };
        let location =
            LocationSource::new(device, AcquisitionPolicy::from_config(&config.location));
        let result_cache = cache::from_config(&config.cache);
        let shared_backend = Arc::new(backend.clone());

        let orchestrator = IntakeOrchestrator::new(
            shared_backend.clone(),
            location,
            result_cache.clone(),
            Arc::new(ConsolePresenter),
            IntakeSettings::from_config(&config.intake),
        );
        Ok(Self {
            orchestrator,
            rehydrator: SessionRehydrator::new(shared_backend, result_cache),
            backend,
            cookie_path,
            location_wait: location_wait(&config.location),
        })
    }

    async fn restore(&self) -> RestoreResult {
        self.orchestrator.rehydrate(&self.rehydrator).await
    }

    /// Take manual coordinates when given; otherwise wait for the device
    /// source to settle. Submission still makes its own last attempt when
    /// nothing arrives in time.
    async fn locate(&self, manual: Option<(f64, f64)>) -> Result<()> {
        if let Some((latitude, longitude)) = manual {
            self.orchestrator.apply_manual_coordinates(latitude, longitude)?;
            return Ok(());
        }

        let mut events = self.orchestrator.location().subscribe();
        self.orchestrator.start_location();
        let waited = tokio::time::timeout(self.location_wait, async {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        self.orchestrator.handle_location_event(&event);
                        if let LocationEvent::Failed(failure) = &event {
                            debug!(code = ?failure.code, "device location gave up");
                        }
                        break;
                    }
                    Err(RecvError::Lagged(skipped)) => debug!(skipped, "location events lagged"),
                    Err(RecvError::Closed) => break,
                }
            }
        })
        .await;
        if waited.is_err() {
            warn!(
                wait_ms = self.location_wait.as_millis() as u64,
                "no location event before deadline"
            );
        }
        self.orchestrator.location().stop();
        Ok(())
    }

    async fn submit(&self, message: &str, manual: Option<(f64, f64)>) -> Result<()> {
        self.locate(manual).await?;
        self.orchestrator.set_message(message);
        match self.orchestrator.submit().await? {
            RequestOutcome::Applied => Ok(()),
            other => bail!("submission did not complete ({other:?})"),
        }
    }

    async fn reserve(&self, hospital: Option<&str>) -> Result<()> {
        let state = self.orchestrator.state();
        let name = match hospital {
            Some(name) => name.to_owned(),
            None => state
                .hospitals
                .as_ref()
                .and_then(|hospitals| hospitals.first())
                .map(|hospital| hospital.name.clone())
                .context("backend returned no hospitals to reserve at")?,
        };
        match self.orchestrator.select_hospital(&name).await? {
            RequestOutcome::Applied => Ok(()),
            other => bail!("reservation did not complete ({other:?})"),
        }
    }

    fn save_cookies(&self) {
        let Some(cookies) = self.backend.transport().session_cookies() else {
            return;
        };
        let result = self
            .cookie_path
            .parent()
            .map_or(Ok(()), fs::create_dir_all)
            .and_then(|_| fs::write(&self.cookie_path, cookies));
        if let Err(err) = result {
            warn!(
                path = %self.cookie_path.display(),
                error = %err,
                "failed to save session cookie"
            );
        }
    }

    fn forget_cookies(&self) {
        match fs::remove_file(&self.cookie_path) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => warn!(
                path = %self.cookie_path.display(),
                error = %err,
                "failed to remove session cookie"
            ),
        }
    }
}

/// Upper bound on waiting for the device: every watch attempt timing out
/// plus the linear backoff between them.
fn location_wait(config: &LocationConfig) -> Duration {
    let attempts = config.max_attempts.saturating_add(1);
    let backoff: u32 = (1..=config.max_attempts).sum();
    config.watch_timeout * attempts + config.backoff_step * backoff
}

fn manual_coordinates(lat: Option<f64>, lng: Option<f64>) -> Option<(f64, f64)> {
    lat.zip(lng)
}

pub async fn status(config: &AppConfig, output: Output) -> Result<()> {
    let intake = Intake::build(config)?;
    if !intake.restore().await.is_restored() && !output.json {
        println!("No active emergency session.");
        return Ok(());
    }
    output.snapshot(&intake.orchestrator.snapshot())
}

pub async fn submit(config: &AppConfig, output: Output, args: SubmitArgs) -> Result<()> {
    let intake = Intake::build(config)?;
    if let RestoreResult::Restored(restored) = intake.restore().await {
        output.snapshot(&intake.orchestrator.snapshot())?;
        bail!(
            "an emergency session is already at step {}; run `emsctl clear` to start over",
            restored.step().number()
        );
    }
    let result = intake
        .submit(&args.message, manual_coordinates(args.lat, args.lng))
        .await;
    intake.save_cookies();
    result?;
    info!("emergency submitted");
    output.snapshot(&intake.orchestrator.snapshot())
}

pub async fn reserve(config: &AppConfig, output: Output, args: ReserveArgs) -> Result<()> {
    let intake = Intake::build(config)?;
    let restored = intake.restore().await;
    match (restored.is_restored(), intake.orchestrator.state().step, &args.message) {
        (true, Step::Confirmed, _) => {
            output.snapshot(&intake.orchestrator.snapshot())?;
            bail!("a bed is already reserved for this session; run `emsctl clear` to start over");
        }
        (true, Step::Triage, _) => {
            info!("reserving from the restored session");
        }
        (_, _, Some(message)) => {
            intake
                .submit(message, manual_coordinates(args.lat, args.lng))
                .await?;
        }
        (_, _, None) => bail!("no emergency in progress; pass --message to submit one first"),
    }
    let result = intake.reserve(args.hospital.as_deref()).await;
    intake.save_cookies();
    result?;
    output.snapshot(&intake.orchestrator.snapshot())
}

pub async fn clear(config: &AppConfig) -> Result<()> {
    let intake = Intake::build(config)?;
    intake.orchestrator.clear_session().await;
    intake.forget_cookies();
    Ok(())
}
