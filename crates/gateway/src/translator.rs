use procgate_core::{Caller, ProcedureEnvelope};
use serde::Deserialize;

/// Procedure listing the inquiries (bounties) visible to a supplier.
pub const LIST_PROCEDURE: &str = "Pur_InquiryQueryForSupplier";
/// Procedure returning one inquiry (bounty) with its lines.
pub const DETAIL_PROCEDURE: &str = "Pur_Inquiry_DetailForSupplier";

/// Query parameters accepted by the resource-list operation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default)]
    pub include_end: Option<String>,
    #[serde(default)]
    pub begin_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
}

impl ListQuery {
    /// Build from decoded query pairs. A repeated key keeps its first value;
    /// unknown keys are ignored.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut query = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_ref() {
                "keyword" => &mut query.keyword,
                "include_end" => &mut query.include_end,
                "begin_date" => &mut query.begin_date,
                "end_date" => &mut query.end_date,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into());
            }
        }
        query
    }
}

/// Maps the two interpreted operations onto legacy procedure envelopes.
///
/// Pure: no I/O, no state beyond the fallback supplier code.
#[derive(Debug, Clone)]
pub struct LegacyTranslator {
    default_supplier: String,
}

impl LegacyTranslator {
    pub fn new(default_supplier: impl Into<String>) -> Self {
        Self {
            default_supplier: default_supplier.into(),
        }
    }

    fn supplier<'a>(&'a self, caller: &'a Caller) -> &'a str {
        caller.supplier_scope().unwrap_or(&self.default_supplier)
    }

    /// Resource-list: filters become named parameters; absent or blank ones
    /// are left out entirely.
    pub fn list(&self, caller: &Caller, query: &ListQuery) -> ProcedureEnvelope {
        let include_end = query
            .include_end
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or("0");

        ProcedureEnvelope::new(LIST_PROCEDURE)
            .par("Supplier", self.supplier(caller))
            .opt_par("P_chnName", query.keyword.as_deref())
            .par("IncludeEnd", include_end)
            .opt_par("BeginDate", query.begin_date.as_deref())
            .opt_par("EndDate", query.end_date.as_deref())
    }

    /// Resource-detail for one inquiry id.
    pub fn detail(&self, caller: &Caller, id: &str) -> ProcedureEnvelope {
        ProcedureEnvelope::new(DETAIL_PROCEDURE)
            .par("InquiryId", id)
            .par("Supplier", self.supplier(caller))
            .out_par("strMessage")
    }
}

impl Default for LegacyTranslator {
    fn default() -> Self {
        Self::new("WBDY")
    }
}
