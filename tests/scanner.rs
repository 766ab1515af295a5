#[cfg(test)]
mod scanner_tests {
    use rox::config::Config;
    use rox::error::{Diagnostics, LoxError};
    use rox::scanner::*;
    use rox::token::*;

    fn assert_token_sequence(source: &str, expected: &[(TokenType, &str)]) {
        assert_token_sequence_with(source, &Config::default(), expected);
    }

    fn assert_token_sequence_with(source: &str, config: &Config, expected: &[(TokenType, &str)]) {
        let scanner = Scanner::new(source, config);
        let tokens: Vec<_> = scanner.filter_map(|r| r.ok()).collect();

        assert_eq!(tokens.len(), expected.len(), "tokens: {:?}", tokens);

        for (actual, (expected_type, expected_lexeme)) in tokens.iter().zip(expected.iter()) {
            assert_eq!(actual.token_type, *expected_type);
            assert_eq!(actual.lexeme, *expected_lexeme);
        }
    }

    fn errors(source: &str) -> Vec<(usize, String)> {
        Scanner::new(source, &Config::default())
            .filter_map(|r| r.err())
            .map(|e| match e {
                LoxError::Lex { line, message } => (line, message),
                other => panic!("unexpected error kind: {:?}", other),
            })
            .collect()
    }

    #[test]
    fn test_scanner_01_symbols() {
        assert_token_sequence(
            "({*.,+*})",
            &[
                (TokenType::LEFT_PAREN, "("),
                (TokenType::LEFT_BRACE, "{"),
                (TokenType::STAR, "*"),
                (TokenType::DOT, "."),
                (TokenType::COMMA, ","),
                (TokenType::PLUS, "+"),
                (TokenType::STAR, "*"),
                (TokenType::RIGHT_BRACE, "}"),
                (TokenType::RIGHT_PAREN, ")"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_02_ternary_and_compound_operators() {
        assert_token_sequence(
            "a ? b : c; x += 1; y -= 2; i++; j--;",
            &[
                (TokenType::IDENTIFIER, "a"),
                (TokenType::QUESTION, "?"),
                (TokenType::IDENTIFIER, "b"),
                (TokenType::COLON, ":"),
                (TokenType::IDENTIFIER, "c"),
                (TokenType::SEMICOLON, ";"),
                (TokenType::IDENTIFIER, "x"),
                (TokenType::PLUS_EQUAL, "+="),
                (TokenType::NUMBER(1.0), "1"),
                (TokenType::SEMICOLON, ";"),
                (TokenType::IDENTIFIER, "y"),
                (TokenType::MINUS_EQUAL, "-="),
                (TokenType::NUMBER(2.0), "2"),
                (TokenType::SEMICOLON, ";"),
                (TokenType::IDENTIFIER, "i"),
                (TokenType::PLUS_PLUS, "++"),
                (TokenType::SEMICOLON, ";"),
                (TokenType::IDENTIFIER, "j"),
                (TokenType::MINUS_MINUS, "--"),
                (TokenType::SEMICOLON, ";"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_03_compound_operators_disabled() {
        assert_token_sequence_with(
            "x += 1",
            &Config::classic(),
            &[
                (TokenType::IDENTIFIER, "x"),
                (TokenType::PLUS, "+"),
                (TokenType::EQUAL, "="),
                (TokenType::NUMBER(1.0), "1"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_04_keywords() {
        assert_token_sequence(
            "break static class classy",
            &[
                (TokenType::BREAK, "break"),
                (TokenType::STATIC, "static"),
                (TokenType::CLASS, "class"),
                (TokenType::IDENTIFIER, "classy"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_05_numbers() {
        let tokens: Vec<Token> = Scanner::new("123 45.67 8.", &Config::default())
            .filter_map(|r| r.ok())
            .collect();

        assert!(matches!(tokens[0].token_type, TokenType::NUMBER(n) if n == 123.0));
        assert!(matches!(tokens[1].token_type, TokenType::NUMBER(n) if n == 45.67));
        assert!(matches!(tokens[2].token_type, TokenType::NUMBER(n) if n == 8.0));
        assert_eq!(tokens[3].token_type, TokenType::DOT);

        assert_eq!(tokens[0].to_string(), "NUMBER 123 123.0");
        assert_eq!(tokens[1].to_string(), "NUMBER 45.67 45.67");
    }

    #[test]
    fn test_scanner_06_string_escapes() {
        let tokens: Vec<Token> = Scanner::new(r#""a\tb\n""#, &Config::default())
            .filter_map(|r| r.ok())
            .collect();

        match &tokens[0].token_type {
            TokenType::STRING(s) => assert_eq!(s, "a\tb\n"),
            other => panic!("expected string, got {:?}", other),
        }

        let raw: Vec<Token> = Scanner::new(r#""a\tb""#, &Config::classic())
            .filter_map(|r| r.ok())
            .collect();

        match &raw[0].token_type {
            TokenType::STRING(s) => assert_eq!(s, "a\\tb"),
            other => panic!("expected string, got {:?}", other),
        }
    }

    #[test]
    fn test_scanner_07_comments_and_lines() {
        let source = "// line comment\n/* block\n /* nested */\n */ x";
        let tokens: Vec<Token> = Scanner::new(source, &Config::default())
            .filter_map(|r| r.ok())
            .collect();

        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].lexeme, "x");
        assert_eq!(tokens[0].line, 4);
        assert_eq!(tokens[1].token_type, TokenType::EOF);
    }

    #[test]
    fn test_scanner_08_unterminated_block_comment_reports_start_line() {
        let errs = errors("x\n/* never\nclosed\n");

        assert_eq!(errs, vec![(2, "Unterminated block comment.".to_string())]);
    }

    #[test]
    fn test_scanner_09_unterminated_string_reports_start_line() {
        let errs = errors("print 1;\n\"abc\ndef");

        assert_eq!(errs, vec![(2, "Unterminated string.".to_string())]);
    }

    #[test]
    fn test_unexpected_chars_token_sequence() {
        let source = ",.$(#";
        let results: Vec<_> = Scanner::new(source, &Config::default()).collect();

        // COMMA, DOT, error, LEFT_PAREN, error, EOF
        assert_eq!(results.len(), 6, "Expected 6 items in result");

        assert_token_matches(&results[0], TokenType::COMMA, ",");
        assert_token_matches(&results[1], TokenType::DOT, ".");
        assert_token_matches(&results[3], TokenType::LEFT_PAREN, "(");
        assert_token_matches(&results[5], TokenType::EOF, "");

        let error_count = results.iter().filter(|r| r.is_err()).count();
        assert_eq!(error_count, 2, "Expected 2 error messages");

        for err in results.iter().filter_map(|r| r.as_ref().err()) {
            assert!(
                err.to_string().contains("Unexpected character"),
                "got: {}",
                err
            );
        }
    }

    #[test]
    fn test_scanner_10_multibyte_unexpected_character() {
        let errs = errors("é x");

        assert_eq!(errs, vec![(1, "Unexpected character: é".to_string())]);
    }

    #[test]
    fn test_scan_tokens_reports_and_continues() {
        let mut diagnostics = Diagnostics::new();
        let tokens = Scanner::new("@ 1 @", &Config::default()).scan_tokens(&mut diagnostics);

        assert_eq!(diagnostics.errors().count(), 2);
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens.last().map(|t| t.token_type.clone()), Some(TokenType::EOF));
    }

    #[test]
    fn test_exactly_one_eof() {
        let mut scanner = Scanner::new("", &Config::default());

        assert_token_matches(&scanner.next().unwrap(), TokenType::EOF, "");
        assert!(scanner.next().is_none());
        assert!(scanner.next().is_none());
    }

    fn assert_token_matches(
        result: &Result<Token, LoxError>,
        expected_type: TokenType,
        expected_lexeme: &str,
    ) {
        match result {
            Ok(token) => {
                assert_eq!(token.token_type, expected_type);
                assert_eq!(token.lexeme, expected_lexeme);
            }
            Err(e) => panic!("Expected token, got error: {}", e),
        }
    }
}
