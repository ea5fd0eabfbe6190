use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The legacy system's generic procedure-invocation body.
///
/// Every business call is `POST`ed as `{code, pars, outPars}`: the stored
/// procedure name, its named input parameters, and the output parameters it
/// declares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureEnvelope {
    /// Stored procedure name.
    pub code: String,
    /// Named input parameters. Absent optional parameters are never present
    /// here, not even as empty strings.
    pub pars: Map<String, Value>,
    /// Output parameter placeholders.
    #[serde(rename = "outPars")]
    pub out_pars: Map<String, Value>,
}

impl ProcedureEnvelope {
    /// Start an envelope for `code` with no parameters.
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            pars: Map::new(),
            out_pars: Map::new(),
        }
    }

    /// Add a named input parameter.
    #[must_use]
    pub fn par(mut self, name: &str, value: impl Into<String>) -> Self {
        self.pars.insert(name.to_owned(), Value::String(value.into()));
        self
    }

    /// Add a named input parameter only when `value` carries something.
    #[must_use]
    pub fn opt_par(self, name: &str, value: Option<&str>) -> Self {
        match value.map(str::trim).filter(|v| !v.is_empty()) {
            Some(v) => self.par(name, v),
            None => self,
        }
    }

    /// Declare an output parameter with an empty placeholder.
    #[must_use]
    pub fn out_par(mut self, name: &str) -> Self {
        self.out_pars
            .insert(name.to_owned(), Value::String(String::new()));
        self
    }

    /// Look up an input parameter as a string.
    pub fn par_str(&self, name: &str) -> Option<&str> {
        self.pars.get(name).and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_legacy_field_names() {
        let env = ProcedureEnvelope::new("Proc_A").par("Id", "7").out_par("strMessage");
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "code": "Proc_A",
                "pars": {"Id": "7"},
                "outPars": {"strMessage": ""}
            })
        );
    }

    #[test]
    fn optional_parameters_are_omitted_when_absent_or_blank() {
        let env = ProcedureEnvelope::new("Proc_A")
            .opt_par("A", None)
            .opt_par("B", Some(""))
            .opt_par("C", Some("  "))
            .opt_par("D", Some("x"));
        assert_eq!(env.pars.len(), 1);
        assert_eq!(env.par_str("D"), Some("x"));
    }

    #[test]
    fn empty_out_pars_serialize_as_object() {
        let env = ProcedureEnvelope::new("Proc_B");
        let json = serde_json::to_string(&env).unwrap();
        assert!(json.contains("\"outPars\":{}"));
    }
}
