//! Fresh variable names for generated patterns

use oxrdf::Variable;
use rustc_hash::FxHashSet;

/// Hands out variable names that do not clash with the user's variables
///
/// Names are derived from a base name with a numeric suffix, so the same
/// query always gets the same generated names.
#[derive(Debug, Clone, Default)]
pub struct VariableNamer {
    taken: FxHashSet<String>,
}

impl VariableNamer {
    pub fn new<'a>(taken: impl IntoIterator<Item = &'a Variable>) -> Self {
        Self {
            taken: taken.into_iter().map(|v| v.as_str().to_string()).collect(),
        }
    }

    /// `base` if free, otherwise `base2`, `base3`, ...
    pub fn fresh(&mut self, base: &str) -> Variable {
        let mut name = base.to_string();
        let mut suffix = 2;
        while self.taken.contains(&name) {
            name = format!("{}{}", base, suffix);
            suffix += 1;
        }
        self.taken.insert(name.clone());
        Variable::new_unchecked(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_names_avoid_user_variables() {
        let user = [Variable::new_unchecked("count"), Variable::new_unchecked("count2")];
        let mut namer = VariableNamer::new(&user);

        assert_eq!(namer.fresh("count").as_str(), "count3");
        assert_eq!(namer.fresh("count").as_str(), "count4");
        assert_eq!(namer.fresh("mainResourceProp").as_str(), "mainResourceProp");
    }
}
