//! ---
//! ems_section: "11-simulation"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Canned positions and backend payloads."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::time::Duration;

use ems_intake::{EmergencyReport, Reservation, SessionBooking, SessionState};
use ems_location::{AcquisitionOptions, AcquisitionPolicy, LinearBackoff, Position};
use serde_json::json;

/// Central Delhi with a 15 m accuracy radius.
pub fn delhi() -> Position {
    Position {
        latitude: 28.6139,
        longitude: 77.2090,
        accuracy_meters: Some(15.0),
    }
}

pub fn chest_pain_report() -> EmergencyReport {
    serde_json::from_value(json!({
        "triage": {
            "emergency_type": "Cardiac",
            "severity_score": 9,
            "severity_level": "Critical",
            "required_specialist": "Cardiologist",
            "confidence": "High"
        },
        "location": "Connaught Place, New Delhi",
        "hospitals": [
            {"name": "City Heart Institute", "distance_meters": 1200.0},
            {"name": "Metro General", "distance_meters": 3450.0}
        ],
        "ambulance_status": "Ambulance dispatched",
        "doctor_status": "Cardiologist on call",
        "expected_bill": "₹ 45,000 – ₹ 60,000"
    }))
    .expect("fixture report decodes")
}

pub fn reservation(case_id: u64, hospital: &str) -> Reservation {
    Reservation {
        case_id,
        hospital: hospital.to_owned(),
        available_beds: 4,
        message: Some("Bed reserved".to_owned()),
    }
}

pub fn booked_session(case_id: u64, hospital: &str) -> SessionState {
    SessionState {
        emergency: Some(chest_pain_report()),
        booking: Some(SessionBooking {
            case_id,
            hospital_name: hospital.to_owned(),
            available_beds: 4,
        }),
    }
}

/// Acquisition policy with short, distinct timeouts for paused-clock tests.
pub fn fast_policy() -> AcquisitionPolicy {
    let options = |millis| AcquisitionOptions {
        high_accuracy: true,
        timeout: Duration::from_millis(millis),
        max_cache_age: Duration::ZERO,
    };
    AcquisitionPolicy {
        one_shot: options(1_000),
        watch: options(1_500),
        fallback: options(800),
        backoff: LinearBackoff::new(3, Duration::from_secs(2)),
    }
}
