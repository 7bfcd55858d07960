use fail::FailScenario;

/// Failpoint configuration that is switched off again when dropped.
pub struct CustomFailScenario<'a> {
    _scenario: FailScenario<'a>,
    failpoints: Vec<String>,
}

impl<'a> CustomFailScenario<'a> {
    /// Configures each `(failpoint, action)` pair, e.g. `("file_store.after_body_write", "return")`.
    pub fn setup(failpoints: &[(&str, &str)]) -> CustomFailScenario<'a> {
        let scenario = FailScenario::setup();

        for (failpoint, action) in failpoints {
            fail::cfg(*failpoint, action).unwrap();
        }

        Self {
            _scenario: scenario,
            failpoints: failpoints
                .iter()
                .map(|(failpoint, _)| failpoint.to_string())
                .collect(),
        }
    }

    pub fn teardown(self) {
        drop(self);
    }
}

impl Drop for CustomFailScenario<'_> {
    fn drop(&mut self) {
        for failpoint in &self.failpoints {
            fail::cfg(failpoint, "off").unwrap();
        }
    }
}
