//! Training dataset creation from the signups and outcomes feature groups

use crate::error::PipelineError;
use feature_profiler::{label_mapping, Dataset, TrainingDataSchema, EVENT_LABEL, EVENT_TIMESTAMP};
use fraud_service::{
    FeatureGroup, FeatureStore, OfflineReadiness, PollStep, Poller, QueryEngine, QueryRequest,
    QueryState,
};
use std::collections::BTreeSet;
use tracing::info;

/// Feature store bookkeeping column, never part of the dataset
pub const IGNORED_COLUMN: &str = "EventTime";

/// Arguments of the create-dataset stage
#[derive(Debug, Clone)]
pub struct DatasetParams {
    pub signups_feature_group: String,
    pub outcomes_feature_group: String,
    pub bucket_name: String,
    pub bucket_prefix: String,
}

impl DatasetParams {
    pub fn query_output_location(&self) -> String {
        format!(
            "s3://{}/{}/afd-pipeline/query_results/",
            self.bucket_name, self.bucket_prefix
        )
    }

    fn validate(&self) -> Result<(), PipelineError> {
        for (flag, value) in [
            ("signups-feature-group-name", &self.signups_feature_group),
            ("outcomes-feature-group-name", &self.outcomes_feature_group),
            ("bucket-name", &self.bucket_name),
        ] {
            if value.trim().is_empty() {
                return Err(PipelineError::Validation(format!("--{} is required", flag)));
            }
        }
        Ok(())
    }
}

/// Join query over the two offline stores
#[derive(Debug, Clone, PartialEq)]
pub struct JoinQuery {
    pub sql: String,
    /// Database holding the signups table
    pub database: String,
    /// Every joined column except the label and timestamp, sorted
    pub model_variables: Vec<String>,
}

/// Result of the create-dataset stage
#[derive(Debug, Clone)]
pub struct DatasetOutput {
    pub query: JoinQuery,
    /// Query result rows as CSV with a header row
    pub csv: String,
    pub schema: TrainingDataSchema,
}

fn feature_names(group: &FeatureGroup) -> Vec<&str> {
    let mut names: Vec<&str> = Vec::new();
    for def in &group.feature_definitions {
        let name = def.feature_name.as_str();
        if name != IGNORED_COLUMN && !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

/// Build the join query for the two feature groups
///
/// Columns present in both groups are selected once from the signups table
/// and form the join condition. Columns unique to either side follow in
/// definition order.
pub fn gen_query(signups: &FeatureGroup, outcomes: &FeatureGroup) -> Result<JoinQuery, PipelineError> {
    let catalog = |group: &FeatureGroup| {
        group.data_catalog().cloned().ok_or_else(|| {
            PipelineError::Validation(format!(
                "Feature group {} has no offline store catalog",
                group.feature_group_name
            ))
        })
    };
    let sg = catalog(signups)?;
    let oc = catalog(outcomes)?;

    let sg_features = feature_names(signups);
    let oc_features = feature_names(outcomes);

    let common: BTreeSet<&str> = sg_features
        .iter()
        .filter(|name| oc_features.contains(*name))
        .copied()
        .collect();
    if common.is_empty() {
        return Err(PipelineError::Validation(format!(
            "Feature groups {} and {} share no columns to join on",
            signups.feature_group_name, outcomes.feature_group_name
        )));
    }

    let mut columns: Vec<String> = common
        .iter()
        .map(|name| format!("\"{}\".{} as {}", sg.table_name, name, name))
        .collect();
    columns.extend(
        sg_features
            .iter()
            .chain(oc_features.iter())
            .filter(|name| !common.contains(*name))
            .map(|name| name.to_string()),
    );

    let join_clause = common
        .iter()
        .map(|name| format!("\"{}\".{} = \"{}\".{}", sg.table_name, name, oc.table_name, name))
        .collect::<Vec<_>>()
        .join(" AND ");

    let sql = format!(
        "SELECT DISTINCT {}\nFROM \"{}\" LEFT JOIN \"{}\" ON\n{}",
        columns.join(", "),
        sg.table_name,
        oc.table_name,
        join_clause
    );

    let model_variables: Vec<String> = sg_features
        .iter()
        .chain(oc_features.iter())
        .filter(|name| **name != EVENT_LABEL && **name != EVENT_TIMESTAMP)
        .map(|name| name.to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    Ok(JoinQuery {
        sql,
        database: sg.database,
        model_variables,
    })
}

/// Wait until both offline stores are active
async fn wait_for_offline_stores<S: FeatureStore>(
    store: &S,
    poller: &Poller,
    params: &DatasetParams,
) -> Result<(FeatureGroup, FeatureGroup), PipelineError> {
    let signups_name = params.signups_feature_group.as_str();
    let outcomes_name = params.outcomes_feature_group.as_str();

    let (signups, outcomes) = poller
        .until("feature store offline stores", move || async move {
            let signups = store.describe_feature_group(signups_name).await?;
            let outcomes = store.describe_feature_group(outcomes_name).await?;
            let pending = [&signups, &outcomes]
                .iter()
                .any(|g| g.offline_readiness() == OfflineReadiness::Pending);
            if pending {
                Ok(PollStep::Pending(format!(
                    "{}: {}, {}: {}",
                    signups_name,
                    signups.status_summary(),
                    outcomes_name,
                    outcomes.status_summary()
                )))
            } else {
                Ok(PollStep::Done((signups, outcomes)))
            }
        })
        .await?;

    if signups.offline_readiness() == OfflineReadiness::Failed
        || outcomes.offline_readiness() == OfflineReadiness::Failed
    {
        return Err(PipelineError::UnexpectedStatus {
            what: "Feature group data ingestion".to_string(),
            status: format!(
                "{}: {}, {}: {}",
                signups_name,
                signups.status_summary(),
                outcomes_name,
                outcomes.status_summary()
            ),
        });
    }

    info!("Feature Store offline stores are active");
    Ok((signups, outcomes))
}

/// Run a query to completion and return its rows as CSV
async fn run_query<Q: QueryEngine>(
    engine: &Q,
    poller: &Poller,
    request: &QueryRequest,
) -> Result<String, PipelineError> {
    let execution_id = engine.start_query(request).await?;
    info!("Query ID: {}", execution_id);

    let id = execution_id.as_str();
    let status = poller
        .until("query", move || async move {
            let status = engine.get_query_status(id).await?;
            if status.state.is_pending() {
                Ok(PollStep::Pending(status.state.as_str().to_string()))
            } else {
                Ok(PollStep::Done(status))
            }
        })
        .await?;

    info!("Query status: {}", status.state.as_str());
    if status.state != QueryState::Succeeded {
        return Err(PipelineError::UnexpectedStatus {
            what: format!("Query {}", execution_id),
            status: match status.reason {
                Some(reason) => format!("{} ({})", status.state.as_str(), reason),
                None => status.state.as_str().to_string(),
            },
        });
    }

    Ok(engine.get_query_results(&execution_id).await?)
}

/// Join the two feature groups into a training dataset and derive its schema
pub async fn create_dataset<S>(
    service: &S,
    poller: &Poller,
    params: &DatasetParams,
) -> Result<DatasetOutput, PipelineError>
where
    S: FeatureStore + QueryEngine,
{
    params.validate()?;

    let (signups, outcomes) = wait_for_offline_stores(service, poller, params).await?;
    let query = gen_query(&signups, &outcomes)?;
    info!("Variables: {:?}", query.model_variables);
    info!("Query: {}", query.sql);

    let request = QueryRequest {
        query: query.sql.clone(),
        database: query.database.clone(),
        output_location: params.query_output_location(),
    };
    let csv = run_query(service, poller, &request).await?;

    let dataset = Dataset::from_csv_reader(csv.as_bytes())?;
    let mapper = label_mapping(&dataset)?;
    let schema = TrainingDataSchema::new(query.model_variables.clone(), mapper);
    info!(
        "Training dataset ({} rows) and schema generated: FRAUD={:?} LEGIT={:?}",
        dataset.row_count(),
        schema.label_schema.label_mapper.fraud,
        schema.label_schema.label_mapper.legit
    );

    Ok(DatasetOutput { query, csv, schema })
}
