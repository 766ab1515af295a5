#[cfg(test)]
mod interpreter_tests {
    use rox::config::Config;
    use rox::error::Diagnostics;
    use rox::session::{Outcome, Session};

    struct Run {
        output: String,
        outcome: Outcome,
        errors: Vec<String>,
        warnings: usize,
    }

    fn run_with(config: Config, source: &str) -> Run {
        let mut session = Session::new(config, Vec::new());
        let mut diagnostics = Diagnostics::new();

        let outcome = session.run(source, &mut diagnostics);

        Run {
            output: String::from_utf8(session.into_output()).expect("utf-8 output"),
            outcome,
            errors: diagnostics.errors().map(|d| d.to_string()).collect(),
            warnings: diagnostics.warnings().count(),
        }
    }

    fn run(source: &str) -> Run {
        run_with(Config::default(), source)
    }

    /// Runs a program that must succeed and returns what it printed.
    fn output(source: &str) -> String {
        let result = run(source);

        assert_eq!(
            result.outcome,
            Outcome::Success,
            "errors: {:?}",
            result.errors
        );

        result.output
    }

    fn runtime_error(source: &str) -> String {
        let result = run(source);

        assert_eq!(result.outcome, Outcome::RuntimeError, "output: {}", result.output);
        assert_eq!(result.errors.len(), 1);

        result.errors[0].clone()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Expressions
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn test_interpreter_01_precedence() {
        assert_eq!(output("print 1 + 2 * 3;\nprint (1 + 2) * 3;"), "7\n9\n");
    }

    #[test]
    fn test_interpreter_02_ternary() {
        assert_eq!(
            output("print true ? 1 : 2;\nprint 1 ? 2, 3 : 4;\nprint nil ? 1 : false ? 2 : 3;"),
            "1\n3\n3\n"
        );
    }

    #[test]
    fn test_interpreter_03_comma_yields_right_operand() {
        assert_eq!(output("var a = 1;\nprint (a = 2, a + 1);\nprint a;"), "3\n2\n");
    }

    #[test]
    fn test_interpreter_04_display() {
        let source = r#"
            print 3.0;
            print 1.5;
            print -0.25;
            print nil;
            print true;
            print "text";
            print clock;
            fun f() {}
            print f;
            class A {}
            print A;
            print A();
        "#;

        assert_eq!(
            output(source),
            "3\n1.5\n-0.25\nnil\ntrue\ntext\n<native fn>\n<fn f>\nA\nA instance\n"
        );
    }

    #[test]
    fn test_interpreter_05_equality_and_logic() {
        let source = r#"
            print nil == nil;
            print 1 == "1";
            print "a" == "a";
            print nil or "x";
            print 1 and 2;
            print false and undefined;
        "#;

        assert_eq!(output(source), "true\nfalse\ntrue\nx\n2\nfalse\n");
    }

    #[test]
    fn test_interpreter_06_string_coercion() {
        assert_eq!(
            output(r#"print "1" + 2; print 1 + "x"; print "a" + nil; print "a" + "b";"#),
            "12\n1x\nanil\nab\n"
        );
    }

    #[test]
    fn test_interpreter_07_strings_only_concat() {
        let result = run_with(Config::classic(), r#"print "1" + 2;"#);

        assert_eq!(result.outcome, Outcome::RuntimeError);
        assert_eq!(
            result.errors,
            vec!["Operands must be two numbers or two strings.\n[line 1]"]
        );
    }

    #[test]
    fn test_interpreter_08_division_by_zero() {
        let result = run("print 1;\nprint 5 / 0;\nprint 2;");

        assert_eq!(result.outcome, Outcome::RuntimeError);
        assert_eq!(result.output, "1\n");
        assert_eq!(result.errors, vec!["Division by zero.\n[line 2]"]);
    }

    #[test]
    fn test_interpreter_09_operand_type_errors() {
        assert_eq!(runtime_error(r#"print -"a";"#), "Operand must be a number.\n[line 1]");
        assert_eq!(runtime_error(r#"print "1" < 2;"#), "Operands must be numbers.\n[line 1]");
        assert_eq!(
            runtime_error("print true + 1;"),
            "Operands must be two numbers or at least one string.\n[line 1]"
        );
    }

    #[test]
    fn test_interpreter_10_truthiness() {
        let source = r#"print 0 ? "t" : "f"; print "" ? "t" : "f"; print !nil;"#;

        assert_eq!(output(source), "t\nt\ntrue\n");

        let loose = run_with(Config::loose(), source);
        assert_eq!(loose.outcome, Outcome::Success);
        assert_eq!(loose.output, "f\nf\ntrue\n");
    }

    // ─────────────────────────────────────────────────────────────────────
    // Variables and assignment
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn test_interpreter_11_undefined_variable() {
        assert_eq!(runtime_error("print y;"), "Undefined variable 'y'.\n[line 1]");
        assert_eq!(runtime_error("y = 1;"), "Undefined variable 'y'.\n[line 1]");
    }

    #[test]
    fn test_interpreter_12_uninitialized_is_nil() {
        assert_eq!(output("var a; print a;"), "nil\n");
    }

    #[test]
    fn test_interpreter_13_compound_assignment() {
        assert_eq!(output("var a = 5; a += 2; print a; a -= 10; print a;"), "7\n-3\n");
    }

    #[test]
    fn test_interpreter_14_compound_assignment_through_shadowing() {
        let source = r#"
            var x = 10;
            {
                var x = 1;
                {
                    x += 5;
                    print x;
                }
            }
            print x;
        "#;

        assert_eq!(output(source), "6\n10\n");
    }

    #[test]
    fn test_interpreter_15_compound_assignment_uses_static_binding() {
        // bump() was resolved against the global `n`; a local declared later
        // in the same block must not capture its read or its write.
        let source = r#"
            var n = 1;
            {
                fun bump() {
                    n += 1;
                    return n;
                }
                var n = 100;
                print bump();
                print n;
            }
            print n;
        "#;

        assert_eq!(output(source), "2\n100\n2\n");
    }

    #[test]
    fn test_interpreter_16_compound_assignment_requires_numbers() {
        assert_eq!(
            runtime_error(r#"var s = "a"; s += "b";"#),
            "Operands must be numbers.\n[line 1]"
        );
    }

    #[test]
    fn test_interpreter_17_increment_and_decrement() {
        let source = r#"
            var i = 1;
            print i++;
            print i;
            print ++i;
            print i--;
            print i;
            print --i;
        "#;

        assert_eq!(output(source), "1\n2\n3\n3\n2\n1\n");
    }

    // ─────────────────────────────────────────────────────────────────────
    // Control flow
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn test_interpreter_18_loops() {
        let source = r#"
            var sum = 0;
            for (var i = 1; i <= 4; i = i + 1) sum += i;
            print sum;

            var n = 3;
            while (n > 0) n -= 1;
            print n;
        "#;

        assert_eq!(output(source), "10\n0\n");
    }

    #[test]
    fn test_interpreter_19_break_exits_innermost_loop() {
        let source = r#"
            var hits = 0;
            for (var i = 0; i < 3; i = i + 1) {
                for (var j = 0; j < 10; j = j + 1) {
                    if (j == 2) break;
                    hits += 1;
                }
            }
            print hits;

            var k = 0;
            while (true) {
                k += 1;
                if (k == 5) break;
            }
            print k;
        "#;

        assert_eq!(output(source), "6\n5\n");
    }

    #[test]
    fn test_interpreter_20_return_unwinds_loops() {
        let source = r#"
            fun find() {
                for (var i = 0; i < 10; i = i + 1) {
                    if (i == 4) return i;
                }
                return -1;
            }
            print find();
        "#;

        assert_eq!(output(source), "4\n");
    }

    // ─────────────────────────────────────────────────────────────────────
    // Functions and closures
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn test_interpreter_21_closures_capture_by_reference() {
        let source = r#"
            fun makeCounter() {
                var i = 0;
                fun count() {
                    i = i + 1;
                    return i;
                }
                return count;
            }

            var a = makeCounter();
            var b = makeCounter();
            print a();
            print a();
            print b();
        "#;

        assert_eq!(output(source), "1\n2\n1\n");
    }

    #[test]
    fn test_interpreter_22_loop_body_binding_is_per_iteration() {
        let source = r#"
            var first;
            var second;
            for (var i = 0; i < 2; i = i + 1) {
                var j = i;
                fun show() { print j; }
                if (i == 0) first = show; else second = show;
            }
            first();
            second();
        "#;

        assert_eq!(output(source), "0\n1\n");
    }

    #[test]
    fn test_interpreter_23_loop_variable_is_shared() {
        let source = r#"
            var saved;
            for (var i = 0; i < 2; i = i + 1) {
                if (i == 0) {
                    fun show() { print i; }
                    saved = show;
                }
            }
            saved();
        "#;

        assert_eq!(output(source), "2\n");
    }

    #[test]
    fn test_interpreter_24_recursion() {
        let source = r#"
            fun fib(n) {
                return n < 2 ? n : fib(n - 1) + fib(n - 2);
            }
            print fib(15);
        "#;

        assert_eq!(output(source), "610\n");
    }

    #[test]
    fn test_interpreter_25_call_errors() {
        assert_eq!(
            runtime_error("fun f(a) {}\nf();"),
            "Expected 1 arguments but got 0.\n[line 2]"
        );
        assert_eq!(
            runtime_error(r#""x"();"#),
            "Can only call functions and classes.\n[line 1]"
        );
    }

    #[test]
    fn test_interpreter_26_function_without_return_yields_nil() {
        assert_eq!(output("fun f() {} print f();"), "nil\n");
    }

    // ─────────────────────────────────────────────────────────────────────
    // Classes
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn test_interpreter_27_fields_methods_and_init() {
        let source = r#"
            class Point {
                init(x) { this.x = x; }
                get() { return this.x; }
            }

            var p = Point(3);
            print p.get();
            print p.init(4).x;
            p.x += 10;
            print p.x;

            var m = p.get;
            print m();
        "#;

        assert_eq!(output(source), "3\n4\n14\n14\n");
    }

    #[test]
    fn test_interpreter_28_inheritance_and_super() {
        let source = r#"
            class A {
                method() { return "A method"; }
            }

            class B < A {
                method() { return "B " + super.method(); }
                test() { return super.method(); }
            }

            class C < B {}

            print C().method();
            print C().test();
        "#;

        assert_eq!(output(source), "B A method\nA method\n");
    }

    #[test]
    fn test_interpreter_29_static_members() {
        let source = r#"
            class Counter {
                static init() {
                    this.count = 0;
                    print "static init";
                }

                static bump() {
                    this.count += 1;
                    return this.count;
                }

                init() { Counter.bump(); }
            }

            Counter();
            Counter();
            print Counter.count;
            print Counter.bump();
        "#;

        assert_eq!(output(source), "static init\n2\n3\n");
    }

    #[test]
    fn test_interpreter_30_static_methods_are_not_instance_methods() {
        assert_eq!(
            runtime_error("class A { static s() {} }\nA().s();"),
            "Undefined property 's'.\n[line 2]"
        );
    }

    #[test]
    fn test_interpreter_31_static_initializer_without_parameters() {
        assert_eq!(
            runtime_error("class A { static init(x) {} }"),
            "Static initializer can't take parameters.\n[line 1]"
        );
    }

    #[test]
    fn test_interpreter_32_get_class() {
        let source = r#"
            class A {}
            var a = A();
            print getClass(a) == A;
            print getClass(1);
        "#;

        assert_eq!(output(source), "true\nnil\n");
    }

    #[test]
    fn test_interpreter_33_property_errors() {
        assert_eq!(
            runtime_error("var n = 1;\nprint n.x;"),
            "Only instances have properties.\n[line 2]"
        );
        assert_eq!(
            runtime_error("var n = 1;\nn.x = 2;"),
            "Only instances have fields.\n[line 2]"
        );
        assert_eq!(
            runtime_error("class A {}\nprint A().missing;"),
            "Undefined property 'missing'.\n[line 2]"
        );
        assert_eq!(
            runtime_error("var NotClass = 1;\nclass A < NotClass {}"),
            "Superclass must be a class.\n[line 2]"
        );
    }

    // ─────────────────────────────────────────────────────────────────────
    // Session behaviour
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn test_interpreter_34_static_errors_suppress_execution() {
        let parse = run("print 1;\nprint ;");
        assert_eq!(parse.outcome, Outcome::StaticError);
        assert_eq!(parse.output, "");
        assert_eq!(parse.outcome.exit_code(), 65);

        let resolve = run("print 1;\nreturn 2;");
        assert_eq!(resolve.outcome, Outcome::StaticError);
        assert_eq!(resolve.output, "");

        let scan = run("print 1;\n@");
        assert_eq!(scan.outcome, Outcome::StaticError);
        assert_eq!(scan.output, "");

        let brk = run("print 1;\nbreak;");
        assert_eq!(brk.outcome, Outcome::StaticError);
        assert_eq!(brk.output, "");
    }

    #[test]
    fn test_interpreter_35_warnings_do_not_change_outcome() {
        let result = run("{ var unused = 1; }\nprint 1;");

        assert_eq!(result.outcome, Outcome::Success);
        assert_eq!(result.output, "1\n");
        assert_eq!(result.warnings, 1);
    }

    #[test]
    fn test_interpreter_36_session_persists_between_runs() {
        let mut session = Session::new(Config::default(), Vec::new());
        let mut diagnostics = Diagnostics::new();

        let lines = [
            "var a = 1;",
            "fun make() { var x = 5; fun get() { return x + a; } return get; }",
            "var g = make();",
            "print 1 / 0;",
            "a = 2;",
            "print g();",
        ];

        let outcomes: Vec<Outcome> = lines
            .iter()
            .map(|line| session.run(line, &mut diagnostics))
            .collect();

        assert_eq!(outcomes[3], Outcome::RuntimeError);
        assert_eq!(outcomes[3].exit_code(), 70);
        assert_eq!(outcomes[5], Outcome::Success);

        assert_eq!(String::from_utf8(session.into_output()).unwrap(), "7\n");
    }

    #[test]
    fn test_interpreter_37_class_name_unbound_during_static_init() {
        let source = r#"
            class K {
                static init() {
                    print K;
                }
            }
            print K;
        "#;

        assert_eq!(output(source), "nil\nK\n");
    }

    #[test]
    fn test_interpreter_38_huge_integral_numbers_use_exponent_form() {
        let source = r#"
            print 123456;
            print 9007199254740992;
            print 100000000000000000000000;
            print -100000000000000000000000;
            print 25000000000000000 + 0.5;
        "#;

        assert_eq!(
            output(source),
            "123456\n9007199254740992\n1e23\n-1e23\n2.5e16\n"
        );
    }

    // ─────────────────────────────────────────────────────────────────────
    // Call depth
    // ─────────────────────────────────────────────────────────────────────

    fn shallow() -> Config {
        Config {
            max_call_depth: 32,
            ..Config::default()
        }
    }

    /// Runs `body` on a thread with room for the default call-depth limit.
    fn on_large_stack<T: Send + 'static>(body: impl FnOnce() -> T + Send + 'static) -> T {
        std::thread::Builder::new()
            .stack_size(64 * 1024 * 1024)
            .spawn(body)
            .expect("spawn interpreter thread")
            .join()
            .expect("interpreter thread finished")
    }

    #[test]
    fn test_interpreter_39_unbounded_recursion_is_a_runtime_error() {
        let result = run_with(shallow(), "fun f() { f(); }\nf();");

        assert_eq!(result.outcome, Outcome::RuntimeError);
        assert_eq!(result.errors, vec!["Stack overflow.\n[line 1]"]);
        assert_eq!(result.outcome.exit_code(), 70);

        let config = Config::from_json(r#"{ "max_call_depth": 2 }"#).expect("valid config");
        let result = run_with(config, "fun a() { b(); }\nfun b() { clock(); }\na();");
        assert_eq!(result.outcome, Outcome::RuntimeError);
        assert_eq!(result.errors, vec!["Stack overflow.\n[line 2]"]);
    }

    #[test]
    fn test_interpreter_40_recursion_within_limit_succeeds() {
        let source = r#"
            fun count(n) {
                if (n == 0) return 0;
                return 1 + count(n - 1);
            }
            print count(31);
        "#;

        let result = run_with(shallow(), source);
        assert_eq!(result.outcome, Outcome::Success, "errors: {:?}", result.errors);
        assert_eq!(result.output, "31\n");

        let result = run_with(shallow(), &source.replace("31", "32"));
        assert_eq!(result.outcome, Outcome::RuntimeError);
        assert_eq!(result.errors, vec!["Stack overflow.\n[line 4]"]);
    }

    #[test]
    fn test_interpreter_41_method_and_initializer_calls_count_towards_depth() {
        let method = run_with(shallow(), "class A { m() { this.m(); } }\nA().m();");
        assert_eq!(method.errors, vec!["Stack overflow.\n[line 1]"]);

        let init = run_with(shallow(), "class B { init() { B(); } }\nB();");
        assert_eq!(init.errors, vec!["Stack overflow.\n[line 1]"]);
    }

    #[test]
    fn test_interpreter_42_session_recovers_after_stack_overflow() {
        let mut session = Session::new(shallow(), Vec::new());
        let mut diagnostics = Diagnostics::new();

        let overflow = session.run("fun f() { f(); } f();", &mut diagnostics);
        assert_eq!(overflow, Outcome::RuntimeError);

        let source = "fun count(n) { if (n == 0) return 0; return 1 + count(n - 1); } print count(31);";
        assert_eq!(session.run(source, &mut diagnostics), Outcome::Success);

        assert_eq!(String::from_utf8(session.into_output()).unwrap(), "31\n");
    }

    #[test]
    fn test_interpreter_43_default_limit_fits_on_interpreter_stack() {
        let (deep, unbounded) = on_large_stack(|| {
            let deep = run(r#"
                fun count(n) {
                    if (n == 0) return 0;
                    return 1 + count(n - 1);
                }
                print count(500);
            "#);
            let unbounded = run("fun f() { f(); }\nf();");

            (
                (deep.outcome, deep.output),
                (unbounded.outcome, unbounded.errors),
            )
        });

        assert_eq!(deep, (Outcome::Success, "500\n".to_string()));
        assert_eq!(
            unbounded,
            (
                Outcome::RuntimeError,
                vec!["Stack overflow.\n[line 1]".to_string()]
            )
        );
    }
}
