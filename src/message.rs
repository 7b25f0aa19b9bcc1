// CrashGuard - Alert Message Body

use std::fmt::Write;

use crate::config::MIN_REPORTED_SPEED_KMH;
use crate::events::Location;
use crate::store::EmergencyProfile;

const CRASH_NOTICE: &str = "Kazadan şüphelenildi! Acil yardım gerekebilir.";
const UNKNOWN: &str = "bilinmiyor";

/// Build the alert text. Without a fix the map link and speed lines are left out.
pub fn compose_alert(profile: &EmergencyProfile, location: Option<&Location>) -> String {
    let mut body = String::with_capacity(256);

    let _ = writeln!(body, "{}", or_dash(&profile.full_name()));
    let _ = writeln!(body, "{CRASH_NOTICE}");
    if let Some(location) = location {
        let _ = writeln!(body, "Konum: {}", map_link(location));
    }
    let _ = writeln!(body, "Kan grubu: {}", or_dash(&profile.blood_type));
    let _ = writeln!(body, "Doğum yılı: {}", or_dash(&profile.birth_year));
    let _ = writeln!(body, "Sağlık notları: {}", or_dash(&profile.health_notes));
    if let Some(location) = location {
        let _ = write!(body, "Tahmini hız: {}", speed_text(location));
    }

    body.trim_end().to_string()
}

pub fn map_link(location: &Location) -> String {
    // `{:?}` keeps the trailing ".0" on whole degrees.
    format!(
        "https://maps.google.com/?q={:?},{:?}",
        location.latitude, location.longitude
    )
}

fn speed_text(location: &Location) -> String {
    let kmh = location.speed_kmh();
    if kmh.is_finite() && kmh > MIN_REPORTED_SPEED_KMH {
        format!("{kmh:.1} km/h")
    } else {
        UNKNOWN.to_string()
    }
}

fn or_dash(value: &str) -> &str {
    let value = value.trim();
    if value.is_empty() {
        "-"
    } else {
        value
    }
}
