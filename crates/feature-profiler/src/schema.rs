//! Training data schema and label mapping

use crate::dataset::{Dataset, EVENT_LABEL};
use crate::error::ProfileError;
use serde::{Deserialize, Serialize};

/// Binary label mapping: minority value is fraud, majority is legitimate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelMapper {
    #[serde(rename = "FRAUD")]
    pub fraud: Vec<String>,
    #[serde(rename = "LEGIT")]
    pub legit: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSchema {
    pub label_mapper: LabelMapper,
}

/// Model-input schema submitted with a training request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingDataSchema {
    pub model_variables: Vec<String>,
    pub label_schema: LabelSchema,
}

impl TrainingDataSchema {
    pub fn new(model_variables: Vec<String>, label_mapper: LabelMapper) -> Self {
        Self {
            model_variables,
            label_schema: LabelSchema { label_mapper },
        }
    }
}

/// Distinct non-null label values with their frequencies, in order of first appearance
pub fn label_counts(dataset: &Dataset) -> Result<Vec<(String, usize)>, ProfileError> {
    let column = dataset
        .column(EVENT_LABEL)
        .ok_or(ProfileError::MissingLabel(EVENT_LABEL))?;

    // Labels are matched against the CSV text, so count the cells as written
    let mut counts: Vec<(String, usize)> = Vec::new();
    for label in column.raw_values().flatten() {
        match counts.iter_mut().find(|(l, _)| l == label) {
            Some((_, n)) => *n += 1,
            None => counts.push((label.to_string(), 1)),
        }
    }
    Ok(counts)
}

/// Map the least frequent label to FRAUD and the most frequent to LEGIT
pub fn label_mapping(dataset: &Dataset) -> Result<LabelMapper, ProfileError> {
    if dataset.row_count() == 0 {
        return Err(ProfileError::EmptyDataset);
    }

    let counts = label_counts(dataset)?;
    let [(first, first_n), (second, second_n)] = <[(String, usize); 2]>::try_from(counts)
        .map_err(|counts| ProfileError::NonBinaryLabel {
            distinct: counts.len(),
            values: counts.into_iter().map(|(l, _)| l).collect(),
        })?;

    if first_n == second_n {
        return Err(ProfileError::TiedLabelFrequency {
            first,
            second,
            count: first_n,
        });
    }

    let (fraud, legit) = if first_n < second_n {
        (first, second)
    } else {
        (second, first)
    };

    Ok(LabelMapper {
        fraud: vec![fraud],
        legit: vec![legit],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Column;

    fn labels(values: &[&str]) -> Dataset {
        Dataset::new(vec![Column::from_raw(EVENT_LABEL, values)]).unwrap()
    }

    #[test]
    fn test_minority_is_fraud() {
        let mut values = vec!["fraud"; 10];
        values.extend(vec!["legit"; 90]);
        let mapper = label_mapping(&labels(&values)).unwrap();
        assert_eq!(mapper.fraud, vec!["fraud"]);
        assert_eq!(mapper.legit, vec!["legit"]);
    }

    #[test]
    fn test_order_does_not_matter() {
        let mapper = label_mapping(&labels(&["0", "0", "0", "1"])).unwrap();
        assert_eq!(mapper.fraud, vec!["1"]);
        assert_eq!(mapper.legit, vec!["0"]);
    }

    #[test]
    fn test_nulls_ignored() {
        let mapper = label_mapping(&labels(&["a", "", "b", "b", ""])).unwrap();
        assert_eq!(mapper.fraud, vec!["a"]);
    }

    #[test]
    fn test_labels_keep_csv_text() {
        let csv = "EVENT_LABEL,amount\ntrue,1\nfalse,2\nfalse,3\n";
        let dataset = Dataset::from_csv_reader(csv.as_bytes()).unwrap();
        let mapper = label_mapping(&dataset).unwrap();
        assert_eq!(mapper.fraud, vec!["true"]);
        assert_eq!(mapper.legit, vec!["false"]);

        let csv = "EVENT_LABEL,amount\n1.50,1\n2.00,2\n2.00,3\n";
        let dataset = Dataset::from_csv_reader(csv.as_bytes()).unwrap();
        let mapper = label_mapping(&dataset).unwrap();
        assert_eq!(mapper.fraud, vec!["1.50"]);
        assert_eq!(mapper.legit, vec!["2.00"]);
    }

    #[test]
    fn test_non_binary_rejected() {
        let err = label_mapping(&labels(&["a", "b", "c"])).unwrap_err();
        assert!(matches!(err, ProfileError::NonBinaryLabel { distinct: 3, .. }));

        let err = label_mapping(&labels(&["a", "a"])).unwrap_err();
        assert!(matches!(err, ProfileError::NonBinaryLabel { distinct: 1, .. }));
    }

    #[test]
    fn test_tie_rejected() {
        let err = label_mapping(&labels(&["a", "b", "b", "a"])).unwrap_err();
        assert!(matches!(err, ProfileError::TiedLabelFrequency { count: 2, .. }));
    }

    #[test]
    fn test_missing_label_column() {
        let dataset = Dataset::new(vec![Column::from_raw("amount", &["1"])]).unwrap();
        assert!(matches!(
            label_mapping(&dataset),
            Err(ProfileError::MissingLabel(_))
        ));
    }

    #[test]
    fn test_schema_json_shape() {
        let schema = TrainingDataSchema::new(
            vec!["amount".to_string()],
            LabelMapper {
                fraud: vec!["1".to_string()],
                legit: vec!["0".to_string()],
            },
        );
        let json = serde_json::to_value(&schema).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "modelVariables": ["amount"],
                "labelSchema": {"labelMapper": {"FRAUD": ["1"], "LEGIT": ["0"]}}
            })
        );
    }
}
