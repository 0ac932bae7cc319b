//! Shared fixture: a DuckDB file seeded with the reference risk schema.

use std::path::Path;

use riskql::RiskqlConfig;

pub fn seed_duckdb(db_path: &Path) -> anyhow::Result<()> {
    let conn = duckdb::Connection::open(db_path)?;
    conn.execute_batch(
        "
        CREATE TABLE counterparty_new (
            counterparty_id VARCHAR PRIMARY KEY,
            counterparty_name VARCHAR,
            counterparty_sector VARCHAR,
            internal_rating VARCHAR,
            mpe VARCHAR,
            mpe_limit VARCHAR
        );
        CREATE TABLE trade_new (
            id INTEGER PRIMARY KEY,
            trade_id VARCHAR,
            reporting_counterparty_id VARCHAR,
            notional_usd VARCHAR,
            currency VARCHAR
        );
        CREATE TABLE concentration_new (
            sector VARCHAR,
            concentration_group VARCHAR,
            concentration_value VARCHAR
        );
        INSERT INTO counterparty_new VALUES
            ('C1', 'Alpha Bank', 'Banking', 'A', '500.00', '400.00'),
            ('C2', 'Beta Energy', 'Energy', 'BBB', '100.00', '200.00'),
            ('C3', 'Gamma Retail', 'Retail', 'A', '300.00', '1000.00');
        INSERT INTO trade_new VALUES
            (1, 'T1', 'C1', '1000.00', 'USD'),
            (2, 'T2', 'C1', '2000.00', 'USD'),
            (3, 'T3', 'C2', '500.00', 'EUR');
        INSERT INTO concentration_new VALUES
            ('Banking', 'Financials', '0.50'),
            ('Energy', 'Commodities', '0.10'),
            ('Retail', 'Financials', '0.20'),
            ('Retail', NULL, '0.05');
        ",
    )?;
    Ok(())
}

/// Config pointing at `db_path` with every LLM provider switched off.
pub fn offline_config(db_path: &Path) -> RiskqlConfig {
    let mut config = RiskqlConfig::default();
    config.database.path = db_path.to_path_buf();
    config.llm.openai.enabled = Some(false);
    config.llm.local.enabled = Some(false);
    config
}
