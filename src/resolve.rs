//! Turns a record's refs into the names both backends store.

use crate::error::{Result, SyncError};
use crate::normalize::{format_submitted_by, normalize_for_match};
use crate::store::catalog::Catalog;
use crate::types::{AttendanceRow, RegistrationRecord};

/// Names for a record, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedNames {
    pub person: String,
    pub community: String,
    /// Role actually performed: the person's real role when known, else the selected one.
    pub effective_role: String,
    pub instrument: Option<String>,
}

pub fn resolve_names(record: &RegistrationRecord, catalog: &Catalog) -> Result<ResolvedNames> {
    let community = match catalog.community(&record.community_ref) {
        Some(c) => c.name.clone(),
        None if record.is_external_community() => record
            .community_ref
            .trim_start_matches(crate::types::EXTERNAL_PREFIX)
            .to_string(),
        None => return Err(unresolved("community_ref", &record.community_ref)),
    };

    let selected_role = catalog
        .role(&record.role_ref)
        .map(|r| r.name.clone())
        .ok_or_else(|| unresolved("role_ref", &record.role_ref))?;

    let (person, effective_role) = match record.manual_name() {
        Some(typed) => (typed.trim().to_string(), selected_role),
        None => {
            let p = catalog
                .person(&record.person_ref)
                .ok_or_else(|| unresolved("person_ref", &record.person_ref))?;
            let role = p.real_role.clone().unwrap_or(selected_role);
            (p.full_name.trim().to_string(), role)
        }
    };

    let instrument = record
        .instrument_ref
        .as_deref()
        .and_then(|id| catalog.instrument(id))
        .map(|i| i.name.clone());

    Ok(ResolvedNames {
        person,
        community,
        effective_role,
        instrument,
    })
}

/// Flat row for delivery. The record id must already be canonical.
///
/// Name, community and role are stored in their match form so the relational
/// uniqueness constraint and the same-day lookup compare like with like.
pub fn build_row(record: &RegistrationRecord, catalog: &Catalog) -> Result<AttendanceRow> {
    let names = resolve_names(record, catalog)?;
    Ok(AttendanceRow {
        uuid: record.id.clone(),
        full_name: normalize_for_match(&names.person),
        community: normalize_for_match(&names.community),
        role: normalize_for_match(&names.effective_role),
        instrument: names.instrument.map(|i| i.to_uppercase()),
        location: record.location.clone(),
        recorded_at: record.timestamp,
        submitted_by: format_submitted_by(&record.submitted_by),
    })
}

/// True when the record can never be delivered: blank refs, or refs the
/// loaded catalog does not know about.
pub fn is_structurally_invalid(record: &RegistrationRecord, catalog: &Catalog) -> bool {
    if record.validate().is_err() {
        return true;
    }
    if !catalog.is_loaded() || record.is_external_community() {
        return false;
    }
    catalog.community(&record.community_ref).is_none() || catalog.role(&record.role_ref).is_none()
}

fn unresolved(field: &str, value: &str) -> SyncError {
    SyncError::UnresolvedReference {
        field: field.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Community, Person, Role};
    use chrono::Utc;

    fn catalog() -> Catalog {
        Catalog {
            communities: vec![Community {
                id: "c1".into(),
                name: "Itapevi".into(),
            }],
            roles: vec![
                Role {
                    id: "r-musico".into(),
                    name: "Músico".into(),
                },
                Role {
                    id: "r-org".into(),
                    name: "Organista".into(),
                },
            ],
            instruments: vec![],
            people: vec![Person {
                id: "p1".into(),
                full_name: "Ana Silva".into(),
                community_id: Some("c1".into()),
                real_role: Some("Instrutora".into()),
            }],
        }
    }

    #[test]
    fn test_catalog_person_uses_real_role() {
        let r = RegistrationRecord::new("p1", "c1", "r-org", Utc::now());
        let names = resolve_names(&r, &catalog()).unwrap();
        assert_eq!(names.person, "Ana Silva");
        assert_eq!(names.community, "Itapevi");
        assert_eq!(names.effective_role, "Instrutora");
    }

    #[test]
    fn test_manual_person_uses_selected_role() {
        let r = RegistrationRecord::manual("João Souza", "c1", "r-musico", Utc::now())
            .with_submitted_by("Ricardo de Castro Grangeiro");
        let row = build_row(&r, &catalog()).unwrap();
        assert_eq!(row.full_name, "JOAO SOUZA");
        assert_eq!(row.role, "MUSICO");
        assert_eq!(row.submitted_by, "RICARDO GRANGEIRO");
        assert_eq!(row.uuid, r.id);
    }

    #[test]
    fn test_external_community_resolves_without_catalog_entry() {
        let r = RegistrationRecord::manual("Ana", "external_Cotia", "r-org", Utc::now());
        let names = resolve_names(&r, &catalog()).unwrap();
        assert_eq!(names.community, "Cotia");
        assert!(!is_structurally_invalid(&r, &catalog()));
    }

    #[test]
    fn test_unknown_person_is_unresolved() {
        let r = RegistrationRecord::new("ghost", "c1", "r-org", Utc::now());
        assert!(matches!(
            resolve_names(&r, &catalog()),
            Err(SyncError::UnresolvedReference { field, .. }) if field == "person_ref"
        ));
    }

    #[test]
    fn test_structural_validity() {
        let cat = catalog();
        assert!(is_structurally_invalid(
            &RegistrationRecord::new("p1", "", "r-org", Utc::now()),
            &cat
        ));
        assert!(is_structurally_invalid(
            &RegistrationRecord::new("p1", "c-unknown", "r-org", Utc::now()),
            &cat
        ));
        // unknown refs are tolerated until the catalog has been synced
        assert!(!is_structurally_invalid(
            &RegistrationRecord::new("p1", "c-unknown", "r-org", Utc::now()),
            &Catalog::default()
        ));
    }
}
