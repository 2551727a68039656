pub const BASE_MIGRATION: &str = r#"
CREATE TABLE IF NOT EXISTS provinces (
    province_id INTEGER PRIMARY KEY,
    province_name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS categories (
    category_id INTEGER PRIMARY KEY,
    category_name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS investment_scores (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    province_id INTEGER NOT NULL REFERENCES provinces(province_id),
    category_id INTEGER NOT NULL REFERENCES categories(category_id),
    year INTEGER NOT NULL,
    current_status_score REAL,
    trend_score REAL,
    attractiveness_score REAL,
    priority_score REAL
);
CREATE INDEX IF NOT EXISTS idx_scores_category_year
    ON investment_scores(category_id, year DESC);
CREATE INDEX IF NOT EXISTS idx_scores_province_category
    ON investment_scores(province_id, category_id);

CREATE TABLE IF NOT EXISTS import_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_path TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    row_count INTEGER NOT NULL,
    imported_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_import_hash
    ON import_history(content_hash);
"#;
