mod backend;
mod config;
mod models;
mod pace;
mod percentile;
mod time_codec;
mod utils;

use anyhow::{Context, Result};
use backend::BackendClient;
use config::BackendConfig;
use models::{Distance, PersonalBestRow};
use pace::{format_range, PaceRange};
use percentile::PercentileEngine;
use rmcp::{
    handler::server::tool::ToolRouter,
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;
use time_codec::Duration;
use tokio::io::{stdin, stdout};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use utils::{format_distance_km, format_distance_miles, pace_per_mile};

const MAX_INTERVAL_LEN: usize = 16;
const MAX_USER_ID_LEN: usize = 64;

#[derive(Clone)]
struct RunTribeMcpServer {
    backend: Arc<BackendClient>,
    percentiles: PercentileEngine<Arc<BackendClient>>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl RunTribeMcpServer {
    fn new(backend: BackendClient) -> Self {
        let backend = Arc::new(backend);
        Self {
            percentiles: PercentileEngine::new(Arc::clone(&backend)),
            backend,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "Render an HH:MM:SS finish time in compact form, e.g. '1h 5m 30s'")]
    async fn render_time(
        &self,
        params: rmcp::handler::server::wrapper::Parameters<RenderTimeParams>,
    ) -> Result<CallToolResult, McpError> {
        let params = params.0;
        if let Some(interval) = &params.interval {
            validate_interval(interval)?;
        }

        Ok(CallToolResult::success(vec![Content::text(
            time_codec::render(params.interval.as_deref()),
        )]))
    }

    #[tool(description = "Difference between two HH:MM:SS finish times (first minus second)")]
    async fn compare_times(
        &self,
        params: rmcp::handler::server::wrapper::Parameters<CompareTimesParams>,
    ) -> Result<CallToolResult, McpError> {
        let params = params.0;
        validate_interval(&params.time)?;
        validate_interval(&params.other_time)?;

        let diff = time_codec::diff_seconds(&params.time, &params.other_time);

        Ok(CallToolResult::success(vec![Content::text(
            time_codec::format_difference(diff),
        )]))
    }

    #[tool(description = "Format a club pace range given in fractional minutes per mile (6.25 = 6:15/mile)")]
    async fn format_pace_range(
        &self,
        params: rmcp::handler::server::wrapper::Parameters<FormatPaceRangeParams>,
    ) -> Result<CallToolResult, McpError> {
        let params = params.0;

        // Validate pace values (prevent nonsense like NaN or negative paces)
        for pace in [params.low, params.high] {
            if !pace.is_finite() || pace <= 0.0 {
                return Err(McpError::invalid_params_no_data(format!(
                    "pace must be a positive number of minutes per mile (got {})",
                    pace
                )));
            }
        }

        let range = PaceRange::new(params.low, params.high);

        Ok(CallToolResult::success(vec![Content::text(format_range(
            &range,
        ))]))
    }

    #[tool(description = "Percentile of a finish time among all recorded times for a distance (5k, 10k, half_marathon, marathon)")]
    async fn get_percentile(
        &self,
        params: rmcp::handler::server::wrapper::Parameters<GetPercentileParams>,
    ) -> Result<CallToolResult, McpError> {
        let params = params.0;
        let distance = parse_distance(&params.distance)?;
        if let Some(time) = &params.time {
            validate_interval(time)?;
        }

        let percentile = self
            .percentiles
            .percentile(distance, params.time.as_deref())
            .await;

        Ok(CallToolResult::success(vec![Content::text(
            describe_percentile(distance, percentile),
        )]))
    }

    #[tool(description = "Get a runner's personal bests with percentile and average pace for each distance")]
    async fn get_personal_bests(
        &self,
        params: rmcp::handler::server::wrapper::Parameters<GetPersonalBestsParams>,
    ) -> Result<CallToolResult, McpError> {
        let params = params.0;
        validate_user_id(&params.user_id)?;

        let rows = self
            .backend
            .fetch_personal_bests(&params.user_id)
            .await
            .map_err(McpError::internal)?;

        let mut output = format!("# Personal Bests for {}\n\n", params.user_id);

        for distance in Distance::ALL {
            let row = rows.iter().find(|r| r.distance == distance);
            let percentile = match row.and_then(PersonalBestRow::duration) {
                Some(time) => self.percentiles.percentile_of(distance, &time).await,
                None => None,
            };

            output.push_str(&personal_best_section(distance, row, percentile));
        }

        Ok(CallToolResult::success(vec![Content::text(output)]))
    }

    #[tool(description = "Save a runner's personal best for a distance")]
    async fn set_personal_best(
        &self,
        params: rmcp::handler::server::wrapper::Parameters<SetPersonalBestParams>,
    ) -> Result<CallToolResult, McpError> {
        let params = params.0;
        validate_user_id(&params.user_id)?;
        let distance = parse_distance(&params.distance)?;

        // Minutes and seconds above 59 or negative values are clamped
        let time = Duration::new(params.hours, params.minutes, params.seconds);
        if time.is_zero() {
            return Err(McpError::invalid_params_no_data(
                "finish time must be greater than zero",
            ));
        }

        self.backend
            .upsert_personal_best(&params.user_id, distance, &time)
            .await
            .map_err(McpError::internal)?;

        let wire = time_codec::format(&time);
        Ok(CallToolResult::success(vec![Content::text(format!(
            "Saved {} personal best of {} ({})",
            distance.label(),
            time_codec::render(Some(wire.as_str())),
            wire
        ))]))
    }

    #[tool(description = "Compare two runners' personal bests distance by distance")]
    async fn compare_personal_bests(
        &self,
        params: rmcp::handler::server::wrapper::Parameters<ComparePersonalBestsParams>,
    ) -> Result<CallToolResult, McpError> {
        let params = params.0;
        validate_user_id(&params.user_id)?;
        validate_user_id(&params.other_user_id)?;

        let (rows, other_rows) = tokio::try_join!(
            self.backend.fetch_personal_bests(&params.user_id),
            self.backend.fetch_personal_bests(&params.other_user_id),
        )
        .map_err(McpError::internal)?;

        let mut output = format!(
            "# {} vs {}\n\n",
            params.user_id, params.other_user_id
        );

        for distance in Distance::ALL {
            let time = finish_time_for(&rows, distance);
            let other_time = finish_time_for(&other_rows, distance);

            output.push_str(&format!("## {}\n", distance.label()));
            output.push_str(&format!(
                "- **{}:** {}\n",
                params.user_id,
                time_codec::render(time)
            ));
            output.push_str(&format!(
                "- **{}:** {}\n",
                params.other_user_id,
                time_codec::render(other_time)
            ));

            output.push_str(&format!(
                "- **Difference:** {}\n\n",
                describe_difference(time, other_time)
            ));
        }

        Ok(CallToolResult::success(vec![Content::text(output)]))
    }
}

#[tool_handler]
impl ServerHandler for RunTribeMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some("MCP server for RunTribe personal bests. Provides tools to render and compare finish times, format club pace ranges, and rank personal bests against every recorded time.".into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

// Tool parameter structs
#[derive(Debug, Deserialize, JsonSchema)]
struct RenderTimeParams {
    #[schemars(description = "Finish time in HH:MM:SS format (omit for an unset time)")]
    interval: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct CompareTimesParams {
    #[schemars(description = "Finish time in HH:MM:SS format")]
    time: String,
    #[schemars(description = "Finish time to subtract, in HH:MM:SS format")]
    other_time: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct FormatPaceRangeParams {
    #[schemars(description = "Lower pace in fractional minutes per mile")]
    low: f64,
    #[schemars(description = "Upper pace in fractional minutes per mile")]
    high: f64,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct GetPercentileParams {
    #[schemars(description = "Distance: 5k, 10k, half_marathon or marathon")]
    distance: String,
    #[schemars(description = "Finish time in HH:MM:SS format")]
    time: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct GetPersonalBestsParams {
    #[schemars(description = "Runner's user id")]
    user_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct SetPersonalBestParams {
    #[schemars(description = "Runner's user id")]
    user_id: String,
    #[schemars(description = "Distance: 5k, 10k, half_marathon or marathon")]
    distance: String,
    #[schemars(description = "Hours")]
    hours: i64,
    #[schemars(description = "Minutes (0-59)")]
    minutes: i64,
    #[schemars(description = "Seconds (0-59)")]
    seconds: i64,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ComparePersonalBestsParams {
    #[schemars(description = "Runner's user id")]
    user_id: String,
    #[schemars(description = "User id of the runner to compare against")]
    other_user_id: String,
}

fn finish_time_for(rows: &[PersonalBestRow], distance: Distance) -> Option<&str> {
    rows.iter()
        .find(|r| r.distance == distance)
        .and_then(|r| r.finish_time.as_deref())
}

/// Markdown section for one distance of a runner's personal bests
fn personal_best_section(
    distance: Distance,
    row: Option<&PersonalBestRow>,
    percentile: Option<u8>,
) -> String {
    let mut section = format!(
        "## {} ({} / {})\n",
        distance.label(),
        format_distance_km(distance.kilometers()),
        format_distance_miles(distance.kilometers())
    );
    section.push_str(&format!(
        "- **Time:** {}\n",
        time_codec::render(row.and_then(|r| r.finish_time.as_deref()))
    ));

    if let Some(time) = row.and_then(PersonalBestRow::duration) {
        if let Some(pace) = pace_per_mile(distance, &time) {
            section.push_str(&format!("- **Pace:** {}\n", pace::format_pace(pace)));
        }
    }

    if percentile.is_some() {
        section.push_str(&format!(
            "- **Percentile:** {}\n",
            describe_percentile(distance, percentile)
        ));
    }

    if let Some(updated_at) = row.and_then(|r| r.updated_at) {
        section.push_str(&format!(
            "- **Updated:** {}\n",
            updated_at.format("%Y-%m-%d")
        ));
    }

    section.push('\n');
    section
}

/// Difference between two personal bests, "n/a" unless both are recorded
fn describe_difference(time: Option<&str>, other_time: Option<&str>) -> String {
    match (time, other_time) {
        (Some(a), Some(b)) if !a.is_empty() && !b.is_empty() => {
            time_codec::format_difference(time_codec::diff_seconds(a, b))
        }
        _ => "n/a".to_string(),
    }
}

fn describe_percentile(distance: Distance, percentile: Option<u8>) -> String {
    match percentile {
        Some(p) => format!(
            "Faster than {}% of recorded {} times",
            p,
            distance.label()
        ),
        None => "No percentile available".to_string(),
    }
}

fn parse_distance(key: &str) -> Result<Distance, McpError> {
    key.parse::<Distance>()
        .map_err(|e| McpError::invalid_params_no_data(e.to_string()))
}

fn validate_interval(interval: &str) -> Result<(), McpError> {
    // Validate length (prevent excessive parsing)
    if interval.len() > MAX_INTERVAL_LEN {
        return Err(McpError::invalid_params_no_data(format!(
            "Time must be in HH:MM:SS format ({} characters max)",
            MAX_INTERVAL_LEN
        )));
    }
    Ok(())
}

fn validate_user_id(user_id: &str) -> Result<(), McpError> {
    // User ids end up in backend filters, so only allow id characters
    if user_id.is_empty() || user_id.len() > MAX_USER_ID_LEN {
        return Err(McpError::invalid_params_no_data(format!(
            "user_id must be 1-{} characters",
            MAX_USER_ID_LEN
        )));
    }

    if !user_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(McpError::invalid_params_no_data(format!(
            "Invalid user_id '{}'. Allowed characters: letters, digits, '-' and '_'",
            user_id
        )));
    }

    Ok(())
}

// Helper methods for McpError
trait McpErrorExt {
    fn internal<E: std::fmt::Display>(error: E) -> Self;
    fn invalid_params_no_data<S: Into<String>>(message: S) -> Self;
}

impl McpErrorExt for McpError {
    fn internal<E: std::fmt::Display>(error: E) -> Self {
        tracing::error!(%error, "tool call failed");
        McpError::internal_error(format!("Internal error: {}", error), None)
    }

    fn invalid_params_no_data<S: Into<String>>(message: S) -> Self {
        McpError::invalid_params(message.into(), None)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Logs go to stderr, stdout carries the MCP transport
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "runtribe_mcp=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = BackendConfig::from_env()
        .context("Failed to load backend configuration. Please set RUNTRIBE_BACKEND_URL and RUNTRIBE_BACKEND_KEY environment variables.")?;

    if config.access_token.is_none() {
        tracing::warn!("RUNTRIBE_ACCESS_TOKEN not set, requests will use the project key");
    }

    let backend = BackendClient::new(config).context("Failed to create backend client")?;

    // Create MCP server
    let server = RunTribeMcpServer::new(backend);

    // Create stdio transport
    let transport = (stdin(), stdout());

    // Serve
    tracing::info!("Starting RunTribe MCP server...");
    let service = server.serve(transport).await.map_err(|e| {
        tracing::error!(error = %e, "Error starting server");
        e
    })?;

    service.waiting().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use backend::BackendError;
    use chrono::{TimeZone, Utc};
    use percentile::ReferenceTimeSource;

    struct FiveKOnly;

    impl ReferenceTimeSource for FiveKOnly {
        async fn reference_times(&self, distance: Distance) -> Result<Vec<Duration>, BackendError> {
            if distance != Distance::FiveK {
                return Ok(Vec::new());
            }
            Ok(vec![
                Duration::new(0, 20, 0),
                Duration::new(0, 22, 0),
                Duration::new(0, 25, 0),
            ])
        }
    }

    fn row(distance: Distance, finish_time: Option<&str>) -> PersonalBestRow {
        PersonalBestRow {
            user_id: "u1".to_string(),
            distance,
            finish_time: finish_time.map(str::to_string),
            updated_at: None,
        }
    }

    fn section_for(row: &PersonalBestRow) -> String {
        let engine = PercentileEngine::new(FiveKOnly);
        let percentile = row
            .duration()
            .and_then(|time| tokio_test::block_on(engine.percentile_of(row.distance, &time)));
        personal_best_section(row.distance, Some(row), percentile)
    }

    #[test]
    fn test_personal_best_section_with_time() {
        let mut five_k = row(Distance::FiveK, Some("00:22:00"));
        five_k.updated_at = Some(Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap());

        let section = section_for(&five_k);
        assert!(section.starts_with("## 5K (5.00 km / 3.11 mi)\n"));
        assert!(section.contains("- **Time:** 22m\n"));
        // 22:00 over 3.107 mi
        assert!(section.contains("- **Pace:** 7:05 min/mile\n"));
        assert!(section.contains("- **Percentile:** Faster than 67% of recorded 5K times\n"));
        assert!(section.contains("- **Updated:** 2024-05-01\n"));
    }

    #[test]
    fn test_personal_best_section_without_population() {
        // Nobody else has run a marathon, so only the percentile line is dropped
        let section = section_for(&row(Distance::Marathon, Some("03:00:00")));
        assert!(section.contains("- **Time:** 3h\n"));
        assert!(section.contains("- **Pace:** 6:52 min/mile\n"));
        assert!(!section.contains("Percentile"));
    }

    #[test]
    fn test_personal_best_section_unset() {
        // Row with a null time
        let section = section_for(&row(Distance::TenK, None));
        assert!(section.contains("- **Time:** Not set\n"));
        assert!(!section.contains("Pace"));
        assert!(!section.contains("Percentile"));

        // No row at all
        let section = personal_best_section(Distance::HalfMarathon, None, None);
        assert_eq!(
            section,
            "## Half Marathon (21.10 km / 13.11 mi)\n- **Time:** Not set\n\n"
        );
    }

    #[test]
    fn test_describe_difference() {
        assert_eq!(describe_difference(Some("00:22:00"), Some("00:21:00")), "+ 1m");
        assert_eq!(describe_difference(Some("01:35:00"), Some("01:40:30")), "- 5m 30s");
        assert_eq!(describe_difference(Some("00:45:00"), Some("00:45:00")), "Equal");

        assert_eq!(describe_difference(Some("00:22:00"), None), "n/a");
        assert_eq!(describe_difference(None, Some("00:22:00")), "n/a");
        assert_eq!(describe_difference(Some(""), Some("00:22:00")), "n/a");
    }

    #[test]
    fn test_describe_percentile() {
        assert_eq!(
            describe_percentile(Distance::FiveK, Some(67)),
            "Faster than 67% of recorded 5K times"
        );
        assert_eq!(
            describe_percentile(Distance::Marathon, None),
            "No percentile available"
        );
    }

    #[test]
    fn test_validate_user_id() {
        assert!(validate_user_id("0b7c1c9e-5d3a-4c1f-9b7e-2f1a3c4d5e6f").is_ok());
        assert!(validate_user_id("runner_42").is_ok());

        assert!(validate_user_id("").is_err());
        assert!(validate_user_id(&"a".repeat(MAX_USER_ID_LEN + 1)).is_err());
        // Filter syntax must not reach the backend
        assert!(validate_user_id("1,distance.eq.5k").is_err());
        assert!(validate_user_id("a b").is_err());
    }

    #[test]
    fn test_validate_interval() {
        assert!(validate_interval("01:05:30").is_ok());
        assert!(validate_interval(&"0".repeat(MAX_INTERVAL_LEN + 1)).is_err());
    }

    #[test]
    fn test_finish_time_for() {
        let rows = vec![
            PersonalBestRow {
                user_id: "u1".to_string(),
                distance: Distance::TenK,
                finish_time: Some("00:45:00".to_string()),
                updated_at: None,
            },
            PersonalBestRow {
                user_id: "u1".to_string(),
                distance: Distance::Marathon,
                finish_time: None,
                updated_at: None,
            },
        ];

        assert_eq!(finish_time_for(&rows, Distance::TenK), Some("00:45:00"));
        assert_eq!(finish_time_for(&rows, Distance::Marathon), None);
        assert_eq!(finish_time_for(&rows, Distance::FiveK), None);
    }
}
