/// Schema statements in application order. Kept as discrete statements
/// instead of one script because the trigger function bodies contain
/// semicolons, which rules out naive statement splitting.
pub fn schema_statements(vector_dim: u32) -> Vec<String> {
	SCHEMA_TEMPLATES
		.iter()
		.map(|statement| statement.replace("<VECTOR_DIM>", &vector_dim.to_string()))
		.collect()
}

const SCHEMA_TEMPLATES: &[&str] = &[
	"CREATE EXTENSION IF NOT EXISTS vector",
	"\
CREATE TABLE IF NOT EXISTS leads (
	lead_id         UUID PRIMARY KEY DEFAULT gen_random_uuid(),
	title           TEXT        NOT NULL,
	description     TEXT        NOT NULL DEFAULT '',
	requirement     JSONB       NOT NULL DEFAULT '{}'::jsonb,
	contact_name    TEXT        NOT NULL,
	contact_phone   TEXT        NOT NULL,
	contact_email   TEXT,
	city            TEXT,
	property_type   TEXT,
	status          TEXT        NOT NULL,
	owner_user_id   UUID        NOT NULL,
	created_user_id UUID        NOT NULL,
	embedding       vector(<VECTOR_DIM>),
	search_vector   tsvector,
	created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),
	updated_at      TIMESTAMPTZ NOT NULL DEFAULT NOW()
)",
	"\
CREATE TABLE IF NOT EXISTS properties (
	property_id     UUID PRIMARY KEY DEFAULT gen_random_uuid(),
	title           TEXT        NOT NULL,
	description     TEXT        NOT NULL DEFAULT '',
	address         TEXT        NOT NULL,
	city            TEXT,
	property_type   TEXT        NOT NULL,
	area            DOUBLE PRECISION,
	price           BIGINT,
	rooms           INT,
	status          TEXT        NOT NULL,
	owner_user_id   UUID        NOT NULL,
	created_user_id UUID        NOT NULL,
	embedding       vector(<VECTOR_DIM>),
	search_vector   tsvector,
	created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),
	updated_at      TIMESTAMPTZ NOT NULL DEFAULT NOW()
)",
	"\
CREATE INDEX IF NOT EXISTS idx_leads_embedding
	ON leads USING ivfflat (embedding vector_cosine_ops) WITH (lists = 100)",
	"\
CREATE INDEX IF NOT EXISTS idx_properties_embedding
	ON properties USING ivfflat (embedding vector_cosine_ops) WITH (lists = 100)",
	"CREATE INDEX IF NOT EXISTS idx_leads_search_vector ON leads USING gin (search_vector)",
	"\
CREATE INDEX IF NOT EXISTS idx_properties_search_vector
	ON properties USING gin (search_vector)",
	"CREATE INDEX IF NOT EXISTS idx_leads_created_at ON leads (created_at DESC, lead_id DESC)",
	"\
CREATE INDEX IF NOT EXISTS idx_properties_created_at
	ON properties (created_at DESC, property_id DESC)",
	// Field weights: A for title and city, B for description, C for address.
	"\
CREATE OR REPLACE FUNCTION properties_search_vector_update() RETURNS trigger AS $$
BEGIN
	NEW.search_vector :=
		setweight(to_tsvector('russian', coalesce(NEW.title, '')), 'A') ||
		setweight(to_tsvector('russian', coalesce(NEW.city, '')), 'A') ||
		setweight(to_tsvector('russian', coalesce(NEW.description, '')), 'B') ||
		setweight(to_tsvector('russian', coalesce(NEW.address, '')), 'C');
	RETURN NEW;
END;
$$ LANGUAGE plpgsql",
	"DROP TRIGGER IF EXISTS trg_properties_search_vector ON properties",
	"\
CREATE TRIGGER trg_properties_search_vector
	BEFORE INSERT OR UPDATE OF title, description, address, city ON properties
	FOR EACH ROW EXECUTE FUNCTION properties_search_vector_update()",
	"\
CREATE OR REPLACE FUNCTION leads_search_vector_update() RETURNS trigger AS $$
BEGIN
	NEW.search_vector :=
		setweight(to_tsvector('russian', coalesce(NEW.title, '')), 'A') ||
		setweight(to_tsvector('russian', coalesce(NEW.city, '')), 'A') ||
		setweight(to_tsvector('russian', coalesce(NEW.description, '')), 'B');
	RETURN NEW;
END;
$$ LANGUAGE plpgsql",
	"DROP TRIGGER IF EXISTS trg_leads_search_vector ON leads",
	"\
CREATE TRIGGER trg_leads_search_vector
	BEFORE INSERT OR UPDATE OF title, description, city ON leads
	FOR EACH ROW EXECUTE FUNCTION leads_search_vector_update()",
];

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn substitutes_vector_dimension() {
		let statements = schema_statements(1_024);

		assert!(statements.iter().any(|statement| statement.contains("vector(1024)")));
		assert!(statements.iter().all(|statement| !statement.contains("<VECTOR_DIM>")));
	}

	#[test]
	fn carries_rrf_prerequisites() {
		let statements = schema_statements(8);

		assert!(statements.iter().any(|statement| statement.contains("ivfflat")));
		assert!(statements.iter().any(|statement| statement.contains("lists = 100")));
		assert!(statements.iter().any(|statement| statement.contains("to_tsvector('russian'")));
	}
}
