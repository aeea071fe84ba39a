//! Property-based tests for path handling, blacklist evaluation and
//! variable substitution.

#[cfg(test)]
mod proptest_tests {
    use crate::blacklist::parse_rules;
    use crate::config::Environment;
    use crate::path::normalize;
    use crate::replace::{do_variable_replace, is_variable_file, resolve_env_variables};
    use proptest::prelude::*;
    use std::fs;
    use std::path::{Path, PathBuf};

    // ============================================================================
    // normalize property tests
    // ============================================================================

    proptest! {
        /// Property: normalize is idempotent
        #[test]
        fn normalize_is_idempotent(path in "[a-z./]{0,24}") {
            let once = normalize(Path::new(&path));
            prop_assert_eq!(normalize(&once), once);
        }

        /// Property: a leading "./" and a trailing "/" never change the result
        #[test]
        fn normalize_ignores_cur_dir_and_trailing_separator(
            parts in prop::collection::vec("[a-z]{1,6}", 1..5)
        ) {
            let plain = parts.join("/");
            let decorated = format!("./{}/", plain);
            prop_assert_eq!(normalize(Path::new(&decorated)), PathBuf::from(plain));
        }
    }

    // ============================================================================
    // blacklist property tests
    // ============================================================================

    proptest! {
        /// Property: a rule is active iff at least one condition lists the current value
        #[test]
        fn blacklist_conditions_are_or_ed(
            current in prop::collection::vec("[a-c]", 3),
            listed in prop::collection::vec(prop::collection::vec("[a-c]", 1..3), 3),
        ) {
            let names = ["V0", "V1", "V2"];
            let env: Environment = names.iter().copied().zip(current.iter().cloned()).collect();
            let conditions: Vec<String> = names
                .iter()
                .zip(&listed)
                .map(|(name, values)| format!("{}={}", name, values.join(",")))
                .collect();
            let rules = parse_rules(&format!("some/path {}\n", conditions.join(" "))).unwrap();

            let expected = current
                .iter()
                .zip(&listed)
                .any(|(value, values)| values.contains(value));
            prop_assert_eq!(rules[0].is_active(&env).unwrap(), expected);
        }
    }

    // ============================================================================
    // substitution property tests
    // ============================================================================

    proptest! {
        /// Property: text without tokens is returned unchanged
        #[test]
        fn env_substitution_without_tokens_is_identity(text in prop::collection::vec(any::<u8>(), 0..64)) {
            prop_assume!(!text.windows(19).any(|w| w == b"STAGE_REPLACE_WITH_"));
            let result = resolve_env_variables(&text, &Environment::new(), Path::new("f")).unwrap();
            prop_assert_eq!(result, text);
        }

        /// Property: substituted values are inserted verbatim and never rescanned
        #[test]
        fn env_substitution_is_single_pass(value in "[ -~]{0,40}") {
            let env = Environment::new().with("A", value.clone());
            let result = resolve_env_variables(b"x STAGE_REPLACE_WITH_A y", &env, Path::new("f")).unwrap();
            prop_assert_eq!(result, format!("x {} y", value).into_bytes());
        }

        /// Property: names starting with a __TOKEN__ are variable files, lowercase names never are
        #[test]
        fn variable_file_detection(token in "[A-Z0-9]{1,8}", suffix in "[a-z.]{0,6}", plain in "[a-z][a-z0-9_.]{0,12}") {
            let variable_name = format!("__{}__{}", token, suffix);
            prop_assert!(is_variable_file(&variable_name));
            prop_assert!(!is_variable_file(&plain));
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        /// Property: a second substitution run over the same tree rewrites nothing
        #[test]
        fn substitution_is_idempotent(file_value in "[a-z]{0,10}", env_value in "[a-z ]{0,10}") {
            let temp = tempfile::TempDir::new().unwrap();
            fs::write(temp.path().join("__X__"), format!("{}\n", file_value)).unwrap();
            fs::write(temp.path().join("t"), "pre __X__ STAGE_REPLACE_WITH_V post").unwrap();
            let env = Environment::new().with("V", env_value.clone());

            let first = do_variable_replace(temp.path(), &env).unwrap();
            prop_assert_eq!(first.rewritten, 1);
            prop_assert_eq!(
                fs::read_to_string(temp.path().join("t")).unwrap(),
                format!("pre {} {} post", file_value, env_value)
            );

            let second = do_variable_replace(temp.path(), &env).unwrap();
            prop_assert_eq!(second.rewritten, 0);
        }
    }
}
