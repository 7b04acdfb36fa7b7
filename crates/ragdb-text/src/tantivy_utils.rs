//! ragdb-text
//!
//! Tantivy schema and analyzers for the scoped chunk index. Scope fields are
//! raw `STRING` terms so tenant and namespace match exactly.
use tantivy::schema::{Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, STORED, STRING};
use tantivy::tokenizer::{LowerCaser, SimpleTokenizer, StopWordFilter, TextAnalyzer};
use tantivy::Index;

pub const TEXT_TOKENIZER: &str = "text_with_stopwords";

pub fn build_schema() -> Schema {
	let mut schema_builder = Schema::builder();
	schema_builder.add_text_field("id", STRING | STORED);
	schema_builder.add_text_field("tenant_id", STRING | STORED);
	schema_builder.add_text_field("namespace", STRING | STORED);
	schema_builder.add_text_field("source_type", STRING | STORED);
	schema_builder.add_text_field("metadata", STORED);
	let text_field_indexing = TextFieldIndexing::default().set_tokenizer(TEXT_TOKENIZER).set_index_option(IndexRecordOption::WithFreqsAndPositions);
	let text_options = TextOptions::default().set_indexing_options(text_field_indexing).set_stored();
	schema_builder.add_text_field("text", text_options);
	schema_builder.build()
}

#[derive(Debug, Clone, Copy)]
pub struct ChunkFields {
	pub id: Field,
	pub tenant_id: Field,
	pub namespace: Field,
	pub source_type: Field,
	pub metadata: Field,
	pub text: Field,
}

impl ChunkFields {
	pub fn from_schema(schema: &Schema) -> tantivy::Result<Self> {
		Ok(Self {
			id: schema.get_field("id")?,
			tenant_id: schema.get_field("tenant_id")?,
			namespace: schema.get_field("namespace")?,
			source_type: schema.get_field("source_type")?,
			metadata: schema.get_field("metadata")?,
			text: schema.get_field("text")?,
		})
	}
}

pub fn register_tokenizer(index: &Index) {
	let stop_words = vec![
		"a","an","and","are","as","at","be","by","for","from","has","he","in","is","it","its","of","on","that","the","to","was","will","with","or","but","not","this","these","they","them","their","there","then","than","so","if","when","where","why","how","what","which","who","whom","whose","can","could","should","would","may","might","must","shall","do","does","did","have","had","having",
	];
	let tokenizer = TextAnalyzer::builder(SimpleTokenizer::default())
		.filter(LowerCaser)
		.filter(StopWordFilter::remove(stop_words.into_iter().map(|s| s.to_string())))
		.build();
	index.tokenizers().register(TEXT_TOKENIZER, tokenizer);
}
