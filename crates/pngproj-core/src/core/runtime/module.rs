use std::fmt;

/// One invocation of a GIS module: `name -flags key=value ... --quiet`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleCall {
    pub name: String,
    pub flags: String,
    pub params: Vec<(String, String)>,
    pub quiet: bool,
    pub input: Option<String>,
    /// Extra variables for this child only, on top of the session's.
    pub env: Vec<(String, String)>,
}

impl ModuleCall {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn flags(mut self, flags: &str) -> Self {
        for flag in flags.chars() {
            if !self.flags.contains(flag) {
                self.flags.push(flag);
            }
        }
        self
    }

    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }

    #[must_use]
    pub fn param_opt(self, key: &str, value: Option<impl ToString>) -> Self {
        match value {
            Some(value) => self.param(key, value),
            None => self,
        }
    }

    #[must_use]
    pub fn params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ToString,
    {
        for (key, value) in params {
            self.params.push((key.into(), value.to_string()));
        }
        self
    }

    #[must_use]
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    #[must_use]
    pub fn input(mut self, text: impl Into<String>) -> Self {
        self.input = Some(text.into());
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.env.push((key.into(), value.to_string()));
        self
    }

    pub fn has_flag(&self, flag: char) -> bool {
        self.flags.contains(flag)
    }

    pub fn param_value(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Command line arguments, excluding the program name.
    pub fn args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(self.params.len() + 2);
        if !self.flags.is_empty() {
            args.push(format!("-{}", self.flags));
        }
        args.extend(self.params.iter().map(|(k, v)| format!("{k}={v}")));
        if self.quiet {
            args.push("--quiet".to_string());
        }
        args
    }
}

impl fmt::Display for ModuleCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for arg in self.args() {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}
