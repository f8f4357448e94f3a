//! ---
//! ems_section: "05-networking-external-interfaces"
//! ems_subsection: "binary"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Terminal rendering of intake notices, results and cases."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use anyhow::Result;
use ems_client::{CaseAction, CaseRecord, CaseSummary};
use ems_intake::{IntakeSnapshot, LocationStatus, Notice, Presenter, Step, ToastKind};
use serde::Serialize;

/// Output mode selected on the command line.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    pub json: bool,
}

impl Output {
    fn print_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    pub fn snapshot(&self, snapshot: &IntakeSnapshot) -> Result<()> {
        if self.json {
            return self.print_json(&snapshot.state);
        }
        let state = &snapshot.state;
        println!("Step {}: {}", state.step.number(), step_title(state.step));
        if let Some(position) = &state.position {
            println!("Location: {position}");
        }
        if let Some(triage) = &state.triage {
            let assessment = &triage.assessment;
            println!(
                "Severity: {} ({:.0}%)",
                assessment.severity_level().as_str(),
                assessment.severity_percent()
            );
            if let Some(kind) = assessment.emergency_type() {
                println!("Emergency type: {kind}");
            }
            if let Some(specialist) = assessment.required_specialist() {
                println!("Specialist: {specialist}");
            }
            if let Some(confidence) = assessment.confidence() {
                println!("Confidence: {confidence}");
            }
            if let Some(label) = triage.location_label() {
                println!("Resolved location: {label}");
            }
            for (label, value) in [
                ("Ambulance", &triage.ambulance_status),
                ("Doctor", &triage.doctor_status),
                ("Expected bill", &triage.expected_bill),
            ] {
                if let Some(value) = value {
                    println!("{label}: {value}");
                }
            }
        }
        if snapshot.hospital_list_visible {
            if let Some(hospitals) = &state.hospitals {
                println!("Nearby hospitals:");
                for (index, hospital) in hospitals.iter().enumerate() {
                    println!(
                        "  {}. {}  {:.1} km",
                        index + 1,
                        hospital.name,
                        hospital.distance_km()
                    );
                }
            }
        }
        if let Some(booking) = &state.booking {
            println!(
                "Bed reserved at {} (case #{}, {} beds left)",
                booking.hospital_name, booking.case_id, booking.available_beds
            );
        }
        Ok(())
    }

    pub fn cases(&self, cases: &[CaseRecord]) -> Result<()> {
        if self.json {
            return self.print_json(cases);
        }
        let summary = CaseSummary::from_cases(cases);
        println!(
            "{} cases: {} pending, {} en route, {} completed",
            summary.total, summary.pending, summary.en_route, summary.completed
        );
        for case in cases {
            println!(
                "#{:<5} {:<16} {:<28} {}",
                case.case_id,
                case.status.label(),
                case.hospital_name,
                case.severity_level.as_deref().unwrap_or("-")
            );
            if let Some(dispatch) = &case.dispatch {
                println!(
                    "       {} [{}] eta {}",
                    dispatch.dispatch_status,
                    dispatch.priority_level,
                    dispatch.eta.as_deref().unwrap_or("n/a")
                );
            }
        }
        Ok(())
    }

    pub fn case_action(&self, action: &CaseAction) -> Result<()> {
        if self.json {
            return self.print_json(action);
        }
        println!(
            "Case #{}: {}",
            action.case_id,
            action.message.as_deref().unwrap_or("ok")
        );
        if let Some(dispatch) = &action.dispatch {
            println!(
                "  {} [{}] eta {}",
                dispatch.dispatch_status,
                dispatch.priority_level,
                dispatch.eta.as_deref().unwrap_or("n/a")
            );
        }
        Ok(())
    }
}

fn step_title(step: Step) -> &'static str {
    match step {
        Step::Compose => "describe the emergency",
        Step::Triage => "triage and nearby hospitals",
        Step::Confirmed => "bed reserved",
    }
}

/// Writes notices to stderr so stdout stays reserved for results.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsolePresenter;

impl Presenter for ConsolePresenter {
    fn notify(&self, notice: Notice) {
        match notice {
            Notice::Toast { kind, message } => {
                let tag = match kind {
                    ToastKind::Info => "info",
                    ToastKind::Success => "ok",
                    ToastKind::Warn => "warn",
                    ToastKind::Error => "error",
                };
                eprintln!("[{tag}] {message}");
            }
            Notice::Loading(Some(text)) => eprintln!("… {text}"),
            Notice::Location(LocationStatus::Detecting) => eprintln!("Detecting location…"),
            Notice::Location(LocationStatus::Ready { position, manual }) => {
                let source = if manual { "manual" } else { "device" };
                eprintln!("Location ready ({source}): {position}");
            }
            Notice::Location(LocationStatus::Unavailable { message, .. }) => {
                eprintln!("Location unavailable: {message}");
            }
            Notice::RestoreBanner(true) => eprintln!("Restored your previous emergency session."),
            Notice::StepChanged(_)
            | Notice::ManualEntry(_)
            | Notice::Loading(None)
            | Notice::RestoreBanner(false)
            | Notice::HospitalList(_) => {}
        }
    }
}
