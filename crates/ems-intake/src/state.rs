//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Intake workflow state record and triage payload model."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use ems_location::{LocationEvent, Position};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::api::{EmergencyReport, Reservation, SessionBooking};

/// Workflow step. Moves forward only, except for an explicit reset to `Compose`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    #[default]
    Compose,
    Triage,
    Confirmed,
}

impl Step {
    /// One-based step number as shown on the progress pills.
    pub fn number(&self) -> u8 {
        match self {
            Step::Compose => 1,
            Step::Triage => 2,
            Step::Confirmed => 3,
        }
    }
}

/// Severity classes the backend assigns. Anything unrecognised renders as `Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SeverityLevel {
    Critical,
    Moderate,
    Low,
}

impl SeverityLevel {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "critical" => SeverityLevel::Critical,
            "moderate" => SeverityLevel::Moderate,
            _ => SeverityLevel::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SeverityLevel::Critical => "Critical",
            SeverityLevel::Moderate => "Moderate",
            SeverityLevel::Low => "Low",
        }
    }

    pub fn badge_class(&self) -> &'static str {
        match self {
            SeverityLevel::Critical => "badge-critical",
            SeverityLevel::Moderate => "badge-moderate",
            SeverityLevel::Low => "badge-low",
        }
    }
}

/// Backend triage classification. Kept as the raw JSON object so it can be
/// echoed back unchanged when reserving a bed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TriageAssessment(Map<String, Value>);

impl TriageAssessment {
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    fn text(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn severity_level(&self) -> SeverityLevel {
        self.text("severity_level")
            .map(SeverityLevel::parse)
            .unwrap_or(SeverityLevel::Low)
    }

    pub fn severity_score(&self) -> Option<f64> {
        self.0.get("severity_score").and_then(Value::as_f64)
    }

    /// Score on the 0-10 scale expressed as a bar width percentage.
    pub fn severity_percent(&self) -> f64 {
        (self.severity_score().unwrap_or(0.0) / 10.0 * 100.0).clamp(0.0, 100.0)
    }

    pub fn emergency_type(&self) -> Option<&str> {
        self.text("emergency_type")
    }

    pub fn required_specialist(&self) -> Option<&str> {
        self.text("required_specialist")
    }

    pub fn confidence(&self) -> Option<&str> {
        self.text("confidence")
    }
}

/// Everything the backend returned about a submitted emergency except the
/// hospital list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageResult {
    pub assessment: TriageAssessment,
    /// Backend-resolved location, echoed back verbatim on reservation.
    pub location: Value,
    pub ambulance_status: Option<String>,
    pub doctor_status: Option<String>,
    pub expected_bill: Option<String>,
}

impl TriageResult {
    pub fn from_report(report: &EmergencyReport) -> Self {
        Self {
            assessment: report.triage.clone(),
            location: report.location.clone(),
            ambulance_status: non_empty(&report.ambulance_status),
            doctor_status: non_empty(&report.doctor_status),
            expected_bill: non_empty(&report.expected_bill),
        }
    }

    /// Human-readable place name, when the backend resolved one.
    pub fn location_label(&self) -> Option<&str> {
        self.location.as_str().filter(|label| !label.is_empty())
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.clone().filter(|text| !text.trim().is_empty())
}

/// Candidate hospital, in the order the backend returned it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HospitalOption {
    pub name: String,
    pub distance_meters: f64,
}

impl HospitalOption {
    /// Distance in kilometres rounded to one decimal.
    pub fn distance_km(&self) -> f64 {
        (self.distance_meters / 100.0).round() / 10.0
    }
}

/// Confirmed bed reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingResult {
    pub case_id: u64,
    pub hospital_name: String,
    pub available_beds: u32,
}

impl From<Reservation> for BookingResult {
    fn from(reservation: Reservation) -> Self {
        Self {
            case_id: reservation.case_id,
            hospital_name: reservation.hospital,
            available_beds: reservation.available_beds,
        }
    }
}

impl From<SessionBooking> for BookingResult {
    fn from(booking: SessionBooking) -> Self {
        Self {
            case_id: booking.case_id,
            hospital_name: booking.hospital_name,
            available_beds: booking.available_beds,
        }
    }
}

/// The single mutable record of the intake workflow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntakeState {
    pub step: Step,
    pub position: Option<Position>,
    pub message_draft: String,
    pub triage: Option<TriageResult>,
    pub hospitals: Option<Vec<HospitalOption>>,
    pub booking: Option<BookingResult>,
    pub is_submitting: bool,
    pub is_selecting: bool,
}

impl IntakeState {
    /// True iff a position is held, from the device or manual entry.
    pub fn location_ready(&self) -> bool {
        self.position.is_some()
    }

    /// Number of characters in the trimmed draft.
    pub fn message_chars(&self) -> usize {
        self.message_draft.trim().chars().count()
    }

    /// Whether the submit action is available.
    pub fn submit_enabled(&self, min_message_chars: usize) -> bool {
        self.step == Step::Compose
            && !self.is_submitting
            && self.location_ready()
            && self.message_chars() >= min_message_chars
    }

    /// Fold a location notification into the state. The newest fix wins;
    /// failures leave any held position untouched.
    pub fn apply_location(&mut self, event: &LocationEvent) {
        if let LocationEvent::Update(position) = event {
            self.position = Some(*position);
        }
    }

    pub fn is_busy(&self) -> bool {
        self.is_submitting || self.is_selecting
    }

    /// Check the record's structural invariants. They hold whenever no
    /// submission is in flight; while submitting, step 2 is entered before
    /// the triage payload arrives.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.is_submitting && self.is_selecting {
            return Err("submission and selection in flight simultaneously".into());
        }
        if self.step >= Step::Triage && !self.is_submitting && self.triage.is_none() {
            return Err(format!("step {:?} without triage", self.step));
        }
        if self.step == Step::Confirmed && self.booking.is_none() {
            return Err("confirmed step without booking".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn assessment() -> TriageAssessment {
        serde_json::from_value(json!({
            "emergency_type": "Cardiac",
            "severity_score": 9,
            "severity_level": "Critical",
            "required_specialist": "Cardiologist",
            "confidence": "High"
        }))
        .unwrap()
    }

    #[test]
    fn triage_accessors_read_raw_payload() {
        let triage = assessment();
        assert_eq!(triage.severity_level(), SeverityLevel::Critical);
        assert_eq!(triage.severity_score(), Some(9.0));
        assert_eq!(triage.severity_percent(), 90.0);
        assert_eq!(triage.emergency_type(), Some("Cardiac"));
        assert_eq!(triage.required_specialist(), Some("Cardiologist"));
        assert_eq!(triage.confidence(), Some("High"));
        assert_eq!(triage.severity_level().badge_class(), "badge-critical");
    }

    #[test]
    fn triage_round_trips_unknown_fields() {
        let raw = json!({"severity_level": "moderate", "triage_version": 4});
        let triage: TriageAssessment = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(serde_json::to_value(&triage).unwrap(), raw);
        assert_eq!(triage.severity_level(), SeverityLevel::Moderate);
        assert_eq!(TriageAssessment::default().severity_level(), SeverityLevel::Low);
        assert_eq!(SeverityLevel::parse("unheard-of"), SeverityLevel::Low);
    }

    #[test]
    fn hospital_distance_rounds_to_one_decimal() {
        let hospital = HospitalOption {
            name: "City Hospital".into(),
            distance_meters: 1249.0,
        };
        assert_eq!(hospital.distance_km(), 1.2);
    }

    #[test]
    fn submit_requires_location_and_trimmed_message() {
        let mut state = IntakeState {
            message_draft: "  help  ".into(),
            ..IntakeState::default()
        };
        assert!(!state.submit_enabled(5));
        state.apply_location(&LocationEvent::Update(
            Position::new(28.6, 77.2, None).unwrap(),
        ));
        assert!(state.location_ready());
        assert!(!state.submit_enabled(5));
        state.message_draft = "Severe chest pain".into();
        assert!(state.submit_enabled(5));
        state.is_submitting = true;
        assert!(!state.submit_enabled(5));
    }

    #[test]
    fn newest_position_wins_and_failures_keep_it() {
        let mut state = IntakeState::default();
        let first = Position::new(1.0, 1.0, Some(30.0)).unwrap();
        let second = Position::new(2.0, 2.0, Some(10.0)).unwrap();
        state.apply_location(&LocationEvent::Update(first));
        state.apply_location(&LocationEvent::Update(second));
        state.apply_location(&LocationEvent::Failed(
            ems_location::LocationFailure::permission_denied(),
        ));
        assert_eq!(state.position, Some(second));
    }

    #[test]
    fn invariants_flag_inconsistent_records() {
        assert!(IntakeState::default().check_invariants().is_ok());
        let stray = IntakeState {
            step: Step::Triage,
            ..IntakeState::default()
        };
        assert!(stray.check_invariants().is_err());
        let submitting = IntakeState {
            step: Step::Triage,
            is_submitting: true,
            ..IntakeState::default()
        };
        assert!(submitting.check_invariants().is_ok());
        let confirmed = IntakeState {
            step: Step::Confirmed,
            triage: Some(TriageResult {
                assessment: assessment(),
                location: Value::Null,
                ambulance_status: None,
                doctor_status: None,
                expected_bill: None,
            }),
            ..IntakeState::default()
        };
        assert!(confirmed.check_invariants().is_err());
    }
}
