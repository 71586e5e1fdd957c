use crate::domain::models::{ConsentAnswer, DocumentSection};
use thiserror::Error;

/// Why a set of consent answers was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsentRejection {
    #[error("Missing mandatory consent: {consent_type}")]
    MissingMandatoryConsent { consent_type: String },

    #[error("Mandatory consent not granted: {consent_type}")]
    MandatoryConsentDenied { consent_type: String },
}

/// Check the submitted answers against the document's mandatory consents.
///
/// Sections are visited in document order and the first violation is
/// returned. For each mandatory section only the first answer with a
/// matching `consent_type` is considered. On acceptance the answers are
/// handed back untouched.
pub fn validate(
    sections: &[DocumentSection],
    answers: Vec<ConsentAnswer>,
) -> Result<Vec<ConsentAnswer>, ConsentRejection> {
    for section in sections.iter().filter(|s| s.is_mandatory_consent()) {
        // A mandatory section without a type can never be matched.
        let Some(consent_type) = section.consent_type.as_deref() else {
            return Err(ConsentRejection::MissingMandatoryConsent {
                consent_type: String::new(),
            });
        };

        match answers.iter().find(|a| a.consent_type == consent_type) {
            None => {
                return Err(ConsentRejection::MissingMandatoryConsent {
                    consent_type: consent_type.to_string(),
                });
            }
            Some(answer) if !answer.granted => {
                return Err(ConsentRejection::MandatoryConsentDenied {
                    consent_type: consent_type.to_string(),
                });
            }
            Some(_) => {}
        }
    }

    Ok(answers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn answer(consent_type: &str, granted: bool) -> ConsentAnswer {
        ConsentAnswer::new(consent_type, granted, OffsetDateTime::UNIX_EPOCH)
    }

    fn mandatory(consent_type: &str) -> DocumentSection {
        DocumentSection::consent(consent_type, "text", consent_type, true)
    }

    fn optional(consent_type: &str) -> DocumentSection {
        DocumentSection::consent(consent_type, "text", consent_type, false)
    }

    #[test]
    fn test_missing_mandatory_consent_is_rejected() {
        let sections = vec![DocumentSection::text("t", "body"), mandatory("terms")];

        let result = validate(&sections, vec![answer("marketing", true)]);

        assert_eq!(
            result,
            Err(ConsentRejection::MissingMandatoryConsent {
                consent_type: "terms".to_string()
            })
        );
    }

    #[test]
    fn test_denied_mandatory_consent_is_rejected() {
        let sections = vec![mandatory("terms")];

        let result = validate(&sections, vec![answer("terms", false)]);

        assert_eq!(
            result,
            Err(ConsentRejection::MandatoryConsentDenied {
                consent_type: "terms".to_string()
            })
        );
    }

    #[test]
    fn test_optional_sections_accept_empty_answers() {
        let sections = vec![
            DocumentSection::text("t", "body"),
            optional("marketing"),
            optional("newsletter"),
        ];

        assert_eq!(validate(&sections, vec![]), Ok(vec![]));
        assert_eq!(validate(&[], vec![]), Ok(vec![]));
    }

    #[test]
    fn test_accepted_answers_pass_through_unchanged() {
        let sections = vec![mandatory("terms"), optional("marketing")];
        let answers = vec![
            answer("marketing", false),
            answer("terms", true),
            answer("unknown", true),
        ];

        assert_eq!(validate(&sections, answers.clone()), Ok(answers));
    }

    #[test]
    fn test_first_matching_answer_wins() {
        let sections = vec![mandatory("terms")];

        let denied_first = vec![answer("terms", false), answer("terms", true)];
        assert!(matches!(
            validate(&sections, denied_first),
            Err(ConsentRejection::MandatoryConsentDenied { .. })
        ));

        let granted_first = vec![answer("terms", true), answer("terms", false)];
        assert!(validate(&sections, granted_first).is_ok());
    }

    #[test]
    fn test_first_violation_in_document_order_is_reported() {
        let sections = vec![mandatory("privacy"), mandatory("terms")];

        // `terms` is missing, but `privacy` comes first and is denied.
        let result = validate(&sections, vec![answer("privacy", false)]);

        assert_eq!(
            result,
            Err(ConsentRejection::MandatoryConsentDenied {
                consent_type: "privacy".to_string()
            })
        );
    }

    #[test]
    fn test_text_section_flagged_mandatory_is_ignored() {
        let mut section = DocumentSection::text("t", "body");
        section.consent_mandatory = Some(true);
        section.consent_type = Some("terms".to_string());

        assert!(validate(&[section], vec![]).is_ok());
    }

    #[test]
    fn test_mandatory_section_without_type_is_never_satisfied() {
        let mut section = mandatory("terms");
        section.consent_type = None;

        assert!(matches!(
            validate(&[section], vec![answer("terms", true)]),
            Err(ConsentRejection::MissingMandatoryConsent { .. })
        ));
    }
}
