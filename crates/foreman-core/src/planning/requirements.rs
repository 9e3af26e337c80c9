//! Requirements and gap analysis against the documentation snapshot.

use super::{
    analysis::{Analysis, Feature},
    graph::QuestionDraft,
};
use crate::models::{Capability, DocSnapshot, DocumentKind};

/// A feature enriched with documentation context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub key: String,
    pub title: String,
    pub description: String,
    pub depends_on: Vec<String>,
    pub capabilities: Vec<Capability>,
    pub acceptance_criteria: Vec<String>,
}

/// Requirements plus the gaps found while deriving them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementSet {
    pub requirements: Vec<Requirement>,
    pub questions: Vec<QuestionDraft>,
}

/// Cross-references every feature with the `user_story` and
/// `specification` documents of the snapshot.
///
/// A document paragraph that mentions the feature's key or title
/// contributes its bullet lines and `Given`/`When`/`Then`/`Acceptance:`
/// lines as acceptance criteria. A feature left without criteria keeps its
/// place in the plan and gets an open question.
pub fn analyze(analysis: &Analysis, snapshot: &DocSnapshot) -> RequirementSet {
    let paragraphs: Vec<&str> = snapshot
        .of_kind(DocumentKind::UserStory)
        .chain(snapshot.of_kind(DocumentKind::Specification))
        .flat_map(|doc| doc.body.split("\n\n"))
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    let mut requirements = Vec::with_capacity(analysis.features.len());
    let mut questions = Vec::new();
    for feature in &analysis.features {
        let mut criteria: Vec<String> = feature.acceptance.iter().cloned().collect();
        for paragraph in paragraphs.iter().filter(|p| mentions(p, feature)) {
            for criterion in criteria_lines(paragraph) {
                if !criteria.contains(&criterion) {
                    criteria.push(criterion);
                }
            }
        }

        if criteria.is_empty() {
            questions.push(QuestionDraft {
                requirement_key: feature.key.clone(),
                question: format!(
                    "What are the acceptance criteria for '{}' ({})?",
                    feature.title, feature.key
                ),
            });
        }

        requirements.push(Requirement {
            key: feature.key.clone(),
            title: feature.title.clone(),
            description: describe(analysis, feature),
            depends_on: feature.depends_on.clone(),
            capabilities: feature.capabilities.clone(),
            acceptance_criteria: criteria,
        });
    }

    RequirementSet {
        requirements,
        questions,
    }
}

fn mentions(paragraph: &str, feature: &Feature) -> bool {
    let text = paragraph.to_lowercase();
    text.contains(&format!("[{}]", feature.key.to_lowercase()))
        || text.contains(&feature.title.to_lowercase())
}

fn criteria_lines(paragraph: &str) -> Vec<String> {
    paragraph
        .lines()
        .map(str::trim)
        .filter_map(|line| {
            if let Some(rest) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
                return Some(rest.trim().to_string());
            }
            if let Some(rest) = line.strip_prefix("Acceptance:") {
                return Some(rest.trim().to_string());
            }
            ["Given ", "When ", "Then "]
                .iter()
                .any(|p| line.starts_with(p))
                .then(|| line.to_string())
        })
        .filter(|c| !c.is_empty())
        .collect()
}

fn describe(analysis: &Analysis, feature: &Feature) -> String {
    let mut description = format!("{} (part of: {})", feature.title, analysis.intent);
    if !analysis.constraints.is_empty() {
        description.push_str("\n\nConstraints:");
        for constraint in &analysis.constraints {
            description.push_str("\n- ");
            description.push_str(constraint);
        }
    }
    description
}

#[cfg(test)]
mod tests {
    use jiff::Timestamp;

    use super::*;
    use crate::{models::Document, planning::analysis};

    fn doc(kind: DocumentKind, body: &str) -> Document {
        Document {
            id: 1,
            project: "shop".to_string(),
            kind,
            version: 1,
            body: body.to_string(),
            created_at: Timestamp::UNIX_EPOCH,
        }
    }

    #[test]
    fn test_criteria_come_from_stories_and_specs() {
        let analysis =
            analysis::analyze("Add login\n- [form] Login form\n- [session] Session handling")
                .unwrap();
        let snapshot = DocSnapshot {
            project: "shop".to_string(),
            documents: vec![
                doc(
                    DocumentKind::UserStory,
                    "As a customer I want a login form.\n- rejects empty passwords\n\nUnrelated.\n- nothing",
                ),
                doc(
                    DocumentKind::Specification,
                    "Sign-in rules [form]:\nGiven a bad password\nThen an error is shown\n\nAcceptance: no plain text",
                ),
                doc(DocumentKind::Note, "login form\n- notes never count"),
            ],
        };

        let set = analyze(&analysis, &snapshot);
        assert_eq!(
            set.requirements[0].acceptance_criteria,
            vec![
                "rejects empty passwords".to_string(),
                "Given a bad password".to_string(),
                "Then an error is shown".to_string(),
            ]
        );
        assert!(set.requirements[1].acceptance_criteria.is_empty());
        assert_eq!(set.questions.len(), 1);
        assert_eq!(set.questions[0].requirement_key, "session");
    }

    #[test]
    fn test_inline_acceptance_counts() {
        let analysis = analysis::analyze("Add login\n- [form] Login form => works").unwrap();
        let set = analyze(&analysis, &DocSnapshot::empty("shop"));
        assert_eq!(set.requirements[0].acceptance_criteria, vec!["works".to_string()]);
        assert!(set.questions.is_empty());
    }

    #[test]
    fn test_constraints_flow_into_descriptions() {
        let analysis = analysis::analyze("Add login. Tokens must rotate daily.").unwrap();
        let set = analyze(&analysis, &DocSnapshot::empty("shop"));
        assert!(set.requirements[0]
            .description
            .contains("- Tokens must rotate daily."));
    }
}
