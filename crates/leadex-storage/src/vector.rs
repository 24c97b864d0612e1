use crate::{Error, Result};

/// pgvector text literal; bound as text and cast with `::vector` in SQL.
pub fn vector_to_pg(vec: &[f32]) -> String {
	let mut out = String::with_capacity(vec.len() * 8);

	out.push('[');

	for (i, value) in vec.iter().enumerate() {
		if i > 0 {
			out.push(',');
		}

		out.push_str(&value.to_string());
	}

	out.push(']');

	out
}

pub fn parse_pg_vector(text: &str) -> Result<Vec<f32>> {
	let trimmed = text.trim();
	let without_brackets =
		trimmed.strip_prefix('[').and_then(|s| s.strip_suffix(']')).ok_or_else(|| {
			Error::InvalidArgument("Vector text is not bracketed.".to_string())
		})?;

	if without_brackets.trim().is_empty() {
		return Ok(Vec::new());
	}

	let mut vec = Vec::new();

	for part in without_brackets.split(',') {
		let value: f32 = part.trim().parse().map_err(|_| {
			Error::InvalidArgument("Vector text contains a non-numeric value.".to_string())
		})?;

		vec.push(value);
	}

	Ok(vec)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn round_trips() {
		let vec = vec![0.25, -1.0, 3.5];
		let text = vector_to_pg(&vec);

		assert_eq!(text, "[0.25,-1,3.5]");
		assert_eq!(parse_pg_vector(&text).expect("literal must parse"), vec);
	}

	#[test]
	fn rejects_unbracketed_text() {
		assert!(parse_pg_vector("1,2,3").is_err());
		assert!(parse_pg_vector("[1,oops]").is_err());
	}

	#[test]
	fn empty_vector_parses() {
		assert!(parse_pg_vector("[]").expect("empty literal must parse").is_empty());
	}
}
