//! Terminal parameter table for DEVICE/GET_PARM

/// Named terminal parameters the device reports
///
/// Requests carry a pipe-joined list of parameter names; only recognized
/// names are echoed back as `name=value`, pipe-joined, in request order.
#[derive(Debug, Clone)]
pub struct ParameterTable {
    entries: Vec<(&'static str, &'static str)>,
}

impl Default for ParameterTable {
    fn default() -> Self {
        Self {
            entries: vec![
                ("transactionfloorlimit", "30"),
                ("totalfloorlimit", "5000"),
                ("dayslimit", "1"),
            ],
        }
    }
}

impl ParameterTable {
    /// Create the table with the reference device's parameters
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a pipe-joined request into a pipe-joined answer
    #[must_use]
    pub fn resolve(&self, request: &str) -> String {
        request
            .split('|')
            .filter_map(|name| {
                self.entries
                    .iter()
                    .find(|(key, _)| *key == name)
                    .map(|(key, value)| format!("{key}={value}"))
            })
            .collect::<Vec<_>>()
            .join("|")
    }
}
