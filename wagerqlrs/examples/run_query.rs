use std::sync::Arc;

use wagerql::{
    backends::DuckDbConnection,
    request::{CustomGraphParams, DimensionalParams, PageParams, TimeSeriesParams},
    telemetry, AnalyticsEngine, AuthGuard, ColumnRegistry, RegistryValidator,
};

const SEED: &str = "
CREATE TABLE bet_transactions (
    accepted_datetime_utc TIMESTAMP,
    market_type VARCHAR,
    sport_id VARCHAR,
    sport VARCHAR,
    stat_type VARCHAR,
    bet_type VARCHAR,
    team_abbreviation VARCHAR,
    position_abbreviation VARCHAR,
    player_id VARCHAR,
    player_name VARCHAR,
    client_id VARCHAR,
    client_name VARCHAR,
    usage_id VARCHAR,
    in_play VARCHAR,
    book_risk_component DOUBLE,
    book_profit_gross DOUBLE,
    line_movement DOUBLE,
    bet_price DOUBLE
);
INSERT INTO bet_transactions VALUES
    ('2024-03-01 18:05:00', 'player_props', '4', 'NBA', 'points', 'over', 'BOS', 'F', 'p1', 'Tatum', 'c1', 'Book One', 'u1', 'false', 120.0, -35.5, 0.5, 1.91),
    ('2024-03-01 19:30:00', 'player_props', '4', 'NBA', 'rebounds', 'under', 'DEN', 'C', 'p2', 'Jokic', 'c1', 'Book One', 'u1', 'true', 80.0, 80.0, 0.0, 1.87),
    ('2024-03-02 01:10:00', 'player_props', '1', 'NFL', 'passing_yards', 'over', 'KC', 'QB', 'p3', 'Mahomes', 'c2', 'Book Two', 'u2', 'false', 250.0, 110.0, -1.5, 2.05),
    ('2024-03-02 20:45:00', 'game_lines', '1', 'NFL', 'spread', 'over', 'KC', NULL, NULL, NULL, 'c1', 'Book One', 'u1', 'false', 500.0, -450.0, 0.5, 1.95);
";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing("info,wagerql=debug");

    let backend = DuckDbConnection::open_in_memory()?;
    backend.execute_batch(SEED).await?;

    let registry = ColumnRegistry::builtin();
    let problems = RegistryValidator::new(true).validate(&registry, &backend).await?;
    println!("registry problems: {problems}");

    let engine = AnalyticsEngine::new(
        Arc::new(registry),
        Arc::new(backend),
        AuthGuard::new("demo-secret")?,
    );
    engine.authorize(Some("demo-secret"))?;

    let daily = engine
        .time_series(&TimeSeriesParams {
            market_type: Some("player_props".to_string()),
            start_date: Some("2024-03-01".to_string()),
            end_date: Some("2024-03-02".to_string()),
            ..Default::default()
        })
        .await?;
    println!("time series: {}", serde_json::to_string_pretty(&daily)?);

    let by_sport = engine
        .dimensional(&DimensionalParams {
            dimension: Some("sport".to_string()),
            client_id: Some("c1".to_string()),
            page: PageParams::new(1, 10),
            ..Default::default()
        })
        .await?;
    println!("by sport: {}", serde_json::to_string_pretty(&by_sport)?);

    let graph = engine
        .custom_graph(&CustomGraphParams {
            y_column: Some("book_profit_gross".to_string()),
            x_columns: Some("sport,stat_type".to_string()),
            ..Default::default()
        })
        .await?;
    println!("custom graph: {}", serde_json::to_string_pretty(&graph)?);
    Ok(())
}
