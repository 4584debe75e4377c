//! Clinical suggestion phrasing for out-of-range results.

use crate::catalog::{MedicationPayload, Status};

/// Suggestion string for one out-of-range result, or `None` when the status
/// does not call for one. The caller only invokes this when the reference
/// entry actually registers medications for the status — no medications, no
/// suggestion, silently.
pub fn suggestion_for(test_name: &str, status: Status, meds: &MedicationPayload) -> Option<String> {
    let verb = match status {
        Status::Low => "considerar",
        Status::High => "ajustar",
        _ => return None,
    };
    let names = meds.joined_names();
    if names.is_empty() {
        return None;
    }
    Some(format!("{test_name}: {verb} {names}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{MedicationItem, MedicationRecord};

    #[test]
    fn low_suggests_considerar() {
        let meds = MedicationPayload::Text("Sulfato ferroso".into());
        assert_eq!(
            suggestion_for("Hemoglobina", Status::Low, &meds).unwrap(),
            "Hemoglobina: considerar Sulfato ferroso"
        );
    }

    #[test]
    fn high_suggests_ajustar_with_joined_list() {
        let meds = MedicationPayload::Structured(vec![
            MedicationItem::Record(MedicationRecord {
                name: "Metformina".into(),
                preparation: Some("850mg".into()),
                application: Some("oral".into()),
            }),
            MedicationItem::Name("Gliclazida".into()),
        ]);
        assert_eq!(
            suggestion_for("Glicose", Status::High, &meds).unwrap(),
            "Glicose: ajustar Metformina, Gliclazida"
        );
    }

    #[test]
    fn normal_status_yields_nothing() {
        let meds = MedicationPayload::Text("qualquer".into());
        assert!(suggestion_for("TSH", Status::Normal, &meds).is_none());
        assert!(suggestion_for("TSH", Status::Indefinido, &meds).is_none());
    }

    #[test]
    fn empty_payload_yields_nothing() {
        let meds = MedicationPayload::Structured(vec![]);
        assert!(suggestion_for("TSH", Status::High, &meds).is_none());
    }
}
