//! Query descriptors and URL construction.

use crate::classes;
use crate::error::{ClientError, Result};
use crate::operators::{PredicateValue, ValueFormatter};
use std::collections::HashSet;
use url::Url;

/// How the response body of a query is consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Body decoded as JSON
    Parsed,
    /// Body returned as text (text classes) or bytes (binary classes)
    Raw,
    /// Body streamed line by line
    Lines,
    /// Body streamed in fixed-size chunks
    Chunks,
}

/// Field filters and output options for one query.
///
/// Fields are kept in the order they were added; setting a field again
/// replaces its value without moving it.
///
/// ```rust
/// use spacetrack_client::operators::{greater_than, inclusive_range};
/// use spacetrack_client::Query;
///
/// let query = Query::new()
///     .predicate("norad_cat_id", vec![25544, 20580])
///     .predicate("epoch", greater_than("now-30"))
///     .predicate("format", "tle")
///     .iter_lines();
/// assert!(query.has_predicate("format"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Query {
    predicates: Vec<(String, PredicateValue)>,
    iter_lines: bool,
    iter_content: bool,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter on a field.
    pub fn predicate(mut self, name: impl Into<String>, value: impl Into<PredicateValue>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.predicates.iter_mut().find(|(k, _)| *k == name) {
            Some(entry) => entry.1 = value,
            None => self.predicates.push((name, value)),
        }
        self
    }

    /// Stream the response line by line.
    pub fn iter_lines(mut self) -> Self {
        self.iter_lines = true;
        self
    }

    /// Stream the response in fixed-size chunks.
    pub fn iter_content(mut self) -> Self {
        self.iter_content = true;
        self
    }

    pub fn predicates(&self) -> &[(String, PredicateValue)] {
        &self.predicates
    }

    pub fn has_predicate(&self, name: &str) -> bool {
        self.predicates.iter().any(|(k, _)| k == name)
    }

    /// Resolve the output mode.
    ///
    /// A `format` predicate asks Space-Track for a specific serialization,
    /// which is returned unparsed.
    pub fn output_mode(&self) -> Result<OutputMode> {
        match (self.iter_lines, self.iter_content) {
            (true, true) => Err(ClientError::Config(
                "iter_lines and iter_content cannot both be requested".to_string(),
            )),
            (true, false) => Ok(OutputMode::Lines),
            (false, true) => Ok(OutputMode::Chunks),
            (false, false) if self.has_predicate("format") => Ok(OutputMode::Raw),
            (false, false) => Ok(OutputMode::Parsed),
        }
    }

    /// Check flags against the request class before any network call.
    ///
    /// Binary classes never carry JSON, so their body is returned raw.
    pub(crate) fn validate_for_class(&self, class: &str) -> Result<OutputMode> {
        classes::controller_for(class)?;
        let binary = !classes::is_text_class(class);
        match self.output_mode()? {
            OutputMode::Lines if binary => Err(ClientError::Config(format!(
                "iter_lines is disabled for binary class '{}', since CRLF newlines split \
                 over chunk boundaries would yield extra blank lines; use iter_content instead",
                class
            ))),
            OutputMode::Parsed if binary => Ok(OutputMode::Raw),
            mode => Ok(mode),
        }
    }
}

/// Build `{base}{controller}/{kind}/class/{class}`.
pub(crate) fn class_endpoint(base: &Url, kind: &str, class: &str) -> Result<Url> {
    let controller = classes::controller_for(class)?;
    base.join(&format!("{}/{}/class/{}", controller, kind, class))
        .map_err(|e| ClientError::Config(format!("Invalid request URL: {}", e)))
}

/// Build the query URL for `class`.
///
/// Every field must be one of `class_fields` or a rest predicate. Accepted
/// fields are appended as `/name/value` segments in query order.
pub fn build_query_url<'a>(
    base: &Url,
    class: &str,
    query: &Query,
    class_fields: impl IntoIterator<Item = &'a str>,
    formatter: &dyn ValueFormatter,
) -> Result<Url> {
    query.validate_for_class(class)?;

    let valid: HashSet<&str> = class_fields
        .into_iter()
        .chain(classes::REST_PREDICATES.iter().copied())
        .collect();

    if let Some((key, _)) = query
        .predicates()
        .iter()
        .find(|(key, _)| !valid.contains(key.as_str()))
    {
        return Err(ClientError::UnexpectedArgument {
            class: class.to_string(),
            key: key.clone(),
        });
    }

    let mut url = class_endpoint(base, "query", class)?;
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| ClientError::Config(format!("Base URL cannot hold a path: {}", base)))?;
        for (key, value) in query.predicates() {
            segments.push(key).push(&formatter.format(value));
        }
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::{greater_than, SpaceTrackFormatter};

    fn base() -> Url {
        Url::parse("https://www.space-track.org/").unwrap()
    }

    const GP_FIELDS: &[&str] = &["norad_cat_id", "object_name", "epoch"];

    fn build(class: &str, query: &Query) -> Result<Url> {
        build_query_url(
            &base(),
            class,
            query,
            GP_FIELDS.iter().copied(),
            &SpaceTrackFormatter,
        )
    }

    #[test]
    fn test_segments_in_call_order() {
        let query = Query::new()
            .predicate("object_name", "ISS")
            .predicate("norad_cat_id", 25544)
            .predicate("orderby", "epoch desc")
            .predicate("limit", 1);

        let url = build("gp", &query).unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.space-track.org/basicspacedata/query/class/gp/object_name/ISS/norad_cat_id/25544/orderby/epoch%20desc/limit/1"
        );
    }

    #[test]
    fn test_operator_values_are_escaped() {
        let query = Query::new().predicate("epoch", greater_than("now-30"));
        let url = build("gp", &query).unwrap();
        assert!(url.path().ends_with("/epoch/%3Enow-30"), "{}", url);
    }

    #[test]
    fn test_repeated_field_replaces_value() {
        let query = Query::new()
            .predicate("norad_cat_id", 1)
            .predicate("epoch", "x")
            .predicate("norad_cat_id", 2);
        assert_eq!(query.predicates().len(), 2);
        assert_eq!(query.predicates()[0].1, PredicateValue::Int(2));
    }

    #[test]
    fn test_unexpected_argument() {
        for value in [PredicateValue::Int(1), PredicateValue::Null] {
            let query = Query::new()
                .predicate("norad_cat_id", 1)
                .predicate("bogus", value);
            match build("gp", &query).unwrap_err() {
                ClientError::UnexpectedArgument { class, key } => {
                    assert_eq!(class, "gp");
                    assert_eq!(key, "bogus");
                }
                other => panic!("Expected UnexpectedArgument, got: {:?}", other),
            }
        }
    }

    #[test]
    fn test_unknown_class() {
        let err = build("nope", &Query::new()).unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }

    #[test]
    fn test_both_stream_flags_rejected() {
        for class in ["gp", "satcat", "download"] {
            let query = Query::new().iter_lines().iter_content();
            let err = query.validate_for_class(class).unwrap_err();
            assert!(matches!(err, ClientError::Config(_)), "class {}", class);
        }
    }

    #[test]
    fn test_lines_rejected_for_binary_class() {
        let err = Query::new()
            .iter_lines()
            .validate_for_class("download")
            .unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));

        let mode = Query::new()
            .iter_content()
            .validate_for_class("download")
            .unwrap();
        assert_eq!(mode, OutputMode::Chunks);
    }

    #[test]
    fn test_binary_class_defaults_to_raw() {
        let mode = Query::new().validate_for_class("download").unwrap();
        assert_eq!(mode, OutputMode::Raw);

        let mode = Query::new().validate_for_class("gp").unwrap();
        assert_eq!(mode, OutputMode::Parsed);
    }

    #[test]
    fn test_output_mode() {
        assert_eq!(Query::new().output_mode().unwrap(), OutputMode::Parsed);
        assert_eq!(
            Query::new().predicate("format", "tle").output_mode().unwrap(),
            OutputMode::Raw
        );
        assert_eq!(
            Query::new()
                .predicate("format", "3le")
                .iter_lines()
                .output_mode()
                .unwrap(),
            OutputMode::Lines
        );
    }

    #[test]
    fn test_modeldef_endpoint() {
        let url = class_endpoint(&base(), "modeldef", "cdm").unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.space-track.org/expandedspacedata/modeldef/class/cdm"
        );
    }
}
