pub const CREATE_TABLES: &str = "
CREATE TABLE IF NOT EXISTS findings (
    id TEXT PRIMARY KEY,
    task_id TEXT NOT NULL,
    finding_id TEXT NOT NULL,
    agent_id TEXT NOT NULL,
    submission_id INTEGER NOT NULL,
    title TEXT NOT NULL,
    description TEXT,
    recommendation TEXT,
    code_references TEXT,
    reported_severity TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    category TEXT,
    category_id TEXT,
    evaluated_severity TEXT,
    evaluation_comment TEXT,
    similar_to TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_findings_task ON findings(task_id);
CREATE INDEX IF NOT EXISTS idx_findings_task_agent ON findings(task_id, agent_id);
CREATE INDEX IF NOT EXISTS idx_findings_task_status ON findings(task_id, status);
CREATE INDEX IF NOT EXISTS idx_findings_category ON findings(category_id);
";
