//! Property-based tests for template expansion

#[cfg(test)]
mod tests {
    use crate::config::FuzzerConfig;
    use crate::generator::FuzzyGenerator;
    use crate::parser::TemplateParser;
    use proptest::prelude::*;

    fn build(head: &str, body: &str) -> FuzzyGenerator {
        FuzzyGenerator::new(head, body, &FuzzerConfig::default()).unwrap()
    }

    prop_compose! {
        /// Template with up to three `range` generators split across head and body
        fn arb_range_template()
            (lengths in prop::collection::vec(0usize..5, 0..4), split in 0usize..4)
        -> (String, String, Vec<usize>) {
            let split = split.min(lengths.len());
            let render = |ls: &[usize]| {
                ls.iter()
                    .map(|n| format!("[$range({})$]", n))
                    .collect::<Vec<_>>()
                    .join("x")
            };
            (render(&lengths[..split]), render(&lengths[split..]), lengths)
        }
    }

    proptest! {
        #[test]
        fn property_count_matches_generated(
            (head, body, lengths) in arb_range_template()
        ) {
            let generator = build(&head, &body);
            let expected: usize = lengths.iter().product();

            prop_assert_eq!(generator.count(), expected);
            prop_assert_eq!(generator.generate().count(), expected);
            prop_assert_eq!(generator.generate().size_hint(), (expected, Some(expected)));
        }

        #[test]
        fn property_generation_is_restartable(
            (head, body, _lengths) in arb_range_template()
        ) {
            let generator = build(&head, &body);
            let first: Vec<_> = generator.generate().collect();
            let second: Vec<_> = generator.generate().collect();
            prop_assert_eq!(first, second);
        }

        #[test]
        fn property_random_access_agrees_with_iteration(
            (head, body, _lengths) in arb_range_template()
        ) {
            let generator = build(&head, &body);
            for (ordinal, request) in generator.generate().enumerate() {
                prop_assert_eq!(generator.request_at(ordinal), Some(request.clone()));
                prop_assert_eq!(generator.generate().nth(ordinal), Some(request));
            }
            prop_assert!(generator.request_at(generator.count()).is_none());
        }

        #[test]
        fn property_last_generator_varies_fastest(a in 1usize..4, b in 1usize..4, c in 1usize..4) {
            let generator = build(
                &format!("$range({})$-$range({})$", a, b),
                &format!("$range({})$", c),
            );

            for (i, request) in generator.generate().enumerate() {
                prop_assert_eq!(request.head, format!("{}-{}", i / (b * c), (i / c) % b));
                prop_assert_eq!(request.body, format!("{}", i % c));
            }
        }

        #[test]
        fn property_escaped_text_is_reproduced(head in ".*", body in ".*") {
            let generator = build(&TemplateParser::escape(&head), &TemplateParser::escape(&body));

            prop_assert_eq!(generator.count(), 1);
            let requests: Vec<_> = generator.generate().collect();
            prop_assert_eq!(requests.len(), 1);
            prop_assert_eq!(&requests[0].head, &head);
            prop_assert_eq!(&requests[0].body, &body);
        }

        #[test]
        fn property_literal_list_items_are_substituted(
            items in prop::collection::vec("[a-z0-9]{0,6}", 0..6)
        ) {
            let list = items
                .iter()
                .map(|item| format!("'{}'", item))
                .collect::<Vec<_>>()
                .join(", ");
            let generator = build(&format!("GET /?q=$[{}]$ HTTP/1.1", list), "");

            let heads: Vec<String> = generator.generate().map(|r| r.head).collect();
            let expected: Vec<String> = items
                .iter()
                .map(|item| format!("GET /?q={} HTTP/1.1", item))
                .collect();
            prop_assert_eq!(heads, expected);
        }
    }
}
