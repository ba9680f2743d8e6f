use rkyv::{Archive, Deserialize as RkyvDeserialize, Serialize as RkyvSerialize};
use serde::{Deserialize, Deserializer, Serialize};

/// One FAQ question with its summary answer and optional expandable detail.
#[derive(
    Archive, RkyvSerialize, RkyvDeserialize, Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq,
)]
pub struct FaqEntry {
    /// Author-assigned stable identifier. Seeds the anchor when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub short_answer: String,
    #[serde(default, deserialize_with = "one_or_many")]
    pub detail_section: Vec<DetailSection>,
}

#[derive(
    Archive, RkyvSerialize, RkyvDeserialize, Serialize, Deserialize, Debug, Clone, PartialEq, Eq,
)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DetailSection {
    Text {
        #[serde(default, deserialize_with = "null_as_default")]
        text: String,
    },
    RuleReference {
        #[serde(default, deserialize_with = "null_as_default")]
        rules: Vec<Rule>,
    },
    CardImage {
        #[serde(default, deserialize_with = "null_as_default")]
        cards: Vec<Card>,
    },
    /// Section types this build does not know how to present.
    #[serde(other)]
    Unknown,
}

#[derive(
    Archive, RkyvSerialize, RkyvDeserialize, Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq,
)]
pub struct Rule {
    #[serde(default, deserialize_with = "null_as_default")]
    pub number: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
}

#[allow(dead_code)]
impl Rule {
    /// Nesting depth of the rule, one level per `.` separator in its number.
    pub fn indent_level(&self) -> usize {
        self.number.matches('.').count()
    }
}

#[derive(
    Archive, RkyvSerialize, RkyvDeserialize, Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq,
)]
pub struct Card {
    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errata: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<DetailSection>),
    One(DetailSection),
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<DetailSection>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(section)) => vec![section],
        Some(OneOrMany::Many(sections)) => sections,
    })
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(number: &str) -> Rule {
        Rule {
            number: number.to_string(),
            text: String::new(),
        }
    }

    #[test]
    fn indent_counts_separators() {
        assert_eq!(rule("1").indent_level(), 0);
        assert_eq!(rule("2.1").indent_level(), 1);
        assert_eq!(rule("2.1.3").indent_level(), 2);
        assert_eq!(rule("728.1.a").indent_level(), 2);
        assert_eq!(rule("").indent_level(), 0);
    }
}
