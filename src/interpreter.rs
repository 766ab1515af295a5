//! Tree‑walking evaluator.
//!
//! Statements execute against a chain of [`Environment`]s rooted at one
//! global scope.  Variable occurrences found in the resolver's [`Locals`]
//! table are read and written exactly `distance` scopes up; everything else
//! goes straight to the globals.
//!
//! `break` and `return` are not errors: statement execution yields a
//! [`Completion`] that loops and call frames absorb.  Only genuine runtime
//! errors travel through the `Err` side and unwind every frame.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;
use std::time::{SystemTime, SystemTimeError, UNIX_EPOCH};

use log::{debug, info};

use crate::ast::{Expr, ExprId, FunctionDecl, LiteralValue, Stmt};
use crate::config::{Concat, Config, Truthiness};
use crate::environment::Environment;
use crate::error::{LoxError, Result};
use crate::resolver::Locals;
use crate::token::{Token, TokenType};
use crate::value::{LoxClass, LoxFunction, LoxInstance, NativeFunction, Value};

/// How a statement finished.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Normal,
    Break,
    Return(Value),
}

pub struct Interpreter<W: Write> {
    globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    locals: Locals,
    config: Config,
    out: W,

    /// Calls currently in progress; bounded by `config.max_call_depth`.
    call_depth: usize,
}

impl<W: Write> Interpreter<W> {
    /// Creates a new Interpreter writing `print` output to `out`, with the
    /// native functions `clock` and `getClass` defined.
    pub fn new(config: Config, out: W) -> Self {
        info!("Initializing Interpreter");

        let globals = Rc::new(RefCell::new(Environment::new()));

        for native in natives() {
            debug!("Defining native function '{}'", native.name);

            globals
                .borrow_mut()
                .define(native.name, Value::Native(Rc::new(native)));
        }

        Self {
            environment: Rc::clone(&globals),
            globals,
            locals: Locals::new(),
            config,
            out,
            call_depth: 0,
        }
    }

    /// Add resolver output.  Earlier entries stay valid, so closures defined
    /// by a previous REPL line keep working.
    pub fn install(&mut self, locals: Locals) {
        debug!("Installing {} resolved local(s)", locals.len());
        self.locals.extend(locals);
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Interprets a list of statements (a "program").  Stops at the first
    /// runtime error; statements already executed keep their effects.
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<()> {
        debug!("Interpreting {} statements", statements.len());

        for stmt in statements {
            match self.execute(stmt) {
                Ok(Completion::Normal) => {}
                Ok(_) => debug!("Ignoring stray control signal at top level"),
                Err(e) => {
                    self.out.flush()?;
                    return Err(e);
                }
            }
        }

        self.out.flush()?;

        info!("Interpretation completed successfully");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statements
    // ─────────────────────────────────────────────────────────────────────────

    fn execute(&mut self, stmt: &Stmt) -> Result<Completion> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(Completion::Normal)
            }

            Stmt::Print(expr) => {
                let value: Value = self.evaluate(expr)?;
                debug!("Printing value: {}", value);
                writeln!(self.out, "{}", value)?;
                Ok(Completion::Normal)
            }

            Stmt::Var { name, initializer } => {
                let value: Value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                debug!("Defining variable '{}' = {}", name.lexeme, value);

                self.environment.borrow_mut().define(&name.lexeme, value);
                Ok(Completion::Normal)
            }

            Stmt::Block(statements) => {
                let scope = Environment::nested(&self.environment);
                self.execute_block(statements, scope)
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let cond: Value = self.evaluate(condition)?;

                if self.is_truthy(&cond) {
                    self.execute(then_branch)
                } else if let Some(else_stmt) = else_branch {
                    self.execute(else_stmt)
                } else {
                    Ok(Completion::Normal)
                }
            }

            Stmt::While { condition, body } => {
                loop {
                    let cond: Value = self.evaluate(condition)?;
                    if !self.is_truthy(&cond) {
                        break;
                    }

                    match self.execute(body)? {
                        Completion::Normal => {}
                        Completion::Break => break,
                        ret @ Completion::Return(_) => return Ok(ret),
                    }
                }

                Ok(Completion::Normal)
            }

            Stmt::Break(_) => Ok(Completion::Break),

            Stmt::Function(decl) => {
                debug!("Defining function '{}'", decl.name.lexeme);

                let function = LoxFunction::new(Rc::clone(decl), Rc::clone(&self.environment), false);

                self.environment
                    .borrow_mut()
                    .define(&decl.name.lexeme, Value::Function(Rc::new(function)));
                Ok(Completion::Normal)
            }

            Stmt::Return { value, .. } => {
                let value: Value = match value {
                    Some(e) => self.evaluate(e)?,
                    None => Value::Nil,
                };

                Ok(Completion::Return(value))
            }

            Stmt::Class {
                name,
                superclass,
                methods,
                static_methods,
            } => {
                self.define_class(name, superclass.as_ref(), methods, static_methods)?;
                Ok(Completion::Normal)
            }
        }
    }

    /// Run `statements` in `environment`, restoring the previous environment
    /// afterwards whatever happens.
    pub fn execute_block(
        &mut self,
        statements: &[Stmt],
        environment: Rc<RefCell<Environment>>,
    ) -> Result<Completion> {
        let previous = std::mem::replace(&mut self.environment, environment);

        let mut result: Result<Completion> = Ok(Completion::Normal);

        for stmt in statements {
            match self.execute(stmt) {
                Ok(Completion::Normal) => {}
                other => {
                    result = other;
                    break;
                }
            }
        }

        self.environment = previous;
        result
    }

    fn define_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[Rc<FunctionDecl>],
        static_methods: &[Rc<FunctionDecl>],
    ) -> Result<()> {
        debug!("Defining class '{}'", name.lexeme);

        self.environment.borrow_mut().define(&name.lexeme, Value::Nil);

        let superclass: Option<Rc<LoxClass>> = match superclass {
            Some(expr) => match self.evaluate(expr)? {
                Value::Class(class) => Some(class),
                _ => {
                    let token: &Token = match expr {
                        Expr::Variable { name, .. } => name,
                        _ => name,
                    };
                    return Err(LoxError::runtime(token, "Superclass must be a class."));
                }
            },
            None => None,
        };

        let enclosing = Rc::clone(&self.environment);

        if let Some(superclass) = &superclass {
            self.environment = Environment::nested(&enclosing);
            self.environment
                .borrow_mut()
                .define("super", Value::Class(Rc::clone(superclass)));
        }

        let methods = self.method_table(methods);
        let statics = self.method_table(static_methods);

        let metaclass = Rc::new(LoxClass::new(
            format!("{} metaclass", name.lexeme),
            None,
            statics,
            None,
        ));

        let class = Rc::new(LoxClass::new(
            name.lexeme.clone(),
            superclass,
            methods,
            Some(metaclass),
        ));

        self.environment = enclosing;

        // Static initialisation runs before the name is bound.
        if let Some(init) = class.find_static("init") {
            if init.arity() != 0 {
                return Err(LoxError::runtime(
                    &init.declaration.name,
                    "Static initializer can't take parameters.",
                ));
            }

            debug!("Running static initializer of '{}'", name.lexeme);

            let bound = init.bind(Value::Class(Rc::clone(&class)));
            self.call_function(&bound, Vec::new())?;
        }

        self.environment
            .borrow_mut()
            .assign(name, Value::Class(class))?;

        info!("Class '{}' defined", name.lexeme);
        Ok(())
    }

    fn method_table(&self, decls: &[Rc<FunctionDecl>]) -> HashMap<String, Rc<LoxFunction>> {
        decls
            .iter()
            .map(|decl| {
                let function = LoxFunction::new(
                    Rc::clone(decl),
                    Rc::clone(&self.environment),
                    decl.name.lexeme == "init",
                );

                (decl.name.lexeme.clone(), Rc::new(function))
            })
            .collect()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expressions
    // ─────────────────────────────────────────────────────────────────────────

    /// Evaluates an expression and returns a Value.
    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::String(Rc::clone(s)),
                LiteralValue::True => Value::Bool(true),
                LiteralValue::False => Value::Bool(false),
                LiteralValue::Nil => Value::Nil,
            }),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { operator, right } => {
                let right: Value = self.evaluate(right)?;

                match operator.token_type {
                    TokenType::MINUS => match right {
                        Value::Number(n) => Ok(Value::Number(-n)),
                        _ => Err(LoxError::runtime(operator, "Operand must be a number.")),
                    },
                    TokenType::BANG => Ok(Value::Bool(!self.is_truthy(&right))),
                    _ => Err(LoxError::runtime(operator, "Invalid unary operator.")),
                }
            }

            Expr::Binary {
                left,
                operator,
                right,
            } => {
                let left: Value = self.evaluate(left)?;
                let right: Value = self.evaluate(right)?;
                self.binary(operator, left, right)
            }

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left: Value = self.evaluate(left)?;
                let truthy: bool = self.is_truthy(&left);

                let short_circuit: bool = match operator.token_type {
                    TokenType::OR => truthy,
                    _ => !truthy,
                };

                if short_circuit {
                    Ok(left)
                } else {
                    self.evaluate(right)
                }
            }

            Expr::Ternary {
                condition,
                then_branch,
                else_branch,
            } => {
                let cond: Value = self.evaluate(condition)?;

                if self.is_truthy(&cond) {
                    self.evaluate(then_branch)
                } else {
                    self.evaluate(else_branch)
                }
            }

            Expr::Variable { id, name } => self.lookup_variable(*id, name),

            Expr::Assign {
                id,
                name,
                operator,
                value,
            } => {
                let value: Value = if operator.token_type == TokenType::EQUAL {
                    self.evaluate(value)?
                } else {
                    let current: Value = self.lookup_variable(*id, name)?;
                    let rhs: Value = self.evaluate(value)?;
                    compound(operator, current, rhs)?
                };

                match self.locals.get(id) {
                    Some(&distance) => {
                        Environment::assign_at(&self.environment, distance, name, value.clone())?
                    }
                    None => self.globals.borrow_mut().assign(name, value.clone())?,
                }

                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee: Value = self.evaluate(callee)?;

                let mut args: Vec<Value> = Vec::with_capacity(arguments.len());
                for arg in arguments {
                    args.push(self.evaluate(arg)?);
                }

                self.call_value(callee, paren, args)
            }

            Expr::Get { object, name } => {
                let object: Value = self.evaluate(object)?;
                get_property(&object, name)
            }

            Expr::Set {
                object,
                name,
                operator,
                value,
            } => {
                let object: Value = self.evaluate(object)?;

                if !matches!(object, Value::Instance(_) | Value::Class(_)) {
                    return Err(LoxError::runtime(name, "Only instances have fields."));
                }

                let value: Value = if operator.token_type == TokenType::EQUAL {
                    self.evaluate(value)?
                } else {
                    let current: Value = get_property(&object, name)?;
                    let rhs: Value = self.evaluate(value)?;
                    compound(operator, current, rhs)?
                };

                match &object {
                    Value::Instance(instance) => instance.set_field(&name.lexeme, value.clone()),
                    Value::Class(class) => class.set_field(&name.lexeme, value.clone()),
                    _ => {}
                }

                Ok(value)
            }

            Expr::This { id, keyword } => self.lookup_variable(*id, keyword),

            Expr::Super {
                id,
                keyword,
                method,
            } => self.super_method(*id, keyword, method),
        }
    }

    fn binary(&self, operator: &Token, left: Value, right: Value) -> Result<Value> {
        debug!("Binary {} on {} and {}", operator.lexeme, left, right);

        match operator.token_type {
            TokenType::COMMA => Ok(right),

            TokenType::EQUAL_EQUAL => Ok(Value::Bool(left == right)),
            TokenType::BANG_EQUAL => Ok(Value::Bool(left != right)),

            TokenType::PLUS => match (left, right) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (Value::String(a), Value::String(b)) => {
                    Ok(Value::String(Rc::from(format!("{}{}", a, b))))
                }
                (a, b) => match self.config.concat {
                    Concat::Coerce
                        if matches!(a, Value::String(_)) || matches!(b, Value::String(_)) =>
                    {
                        Ok(Value::String(Rc::from(format!("{}{}", a, b))))
                    }
                    Concat::Coerce => Err(LoxError::runtime(
                        operator,
                        "Operands must be two numbers or at least one string.",
                    )),
                    Concat::StringsOnly => Err(LoxError::runtime(
                        operator,
                        "Operands must be two numbers or two strings.",
                    )),
                },
            },

            TokenType::SLASH => {
                let (a, b) = number_operands(operator, &left, &right)?;
                if b == 0.0 {
                    return Err(LoxError::runtime(operator, "Division by zero."));
                }
                Ok(Value::Number(a / b))
            }

            _ => {
                let (a, b) = number_operands(operator, &left, &right)?;

                match operator.token_type {
                    TokenType::MINUS => Ok(Value::Number(a - b)),
                    TokenType::STAR => Ok(Value::Number(a * b)),
                    TokenType::GREATER => Ok(Value::Bool(a > b)),
                    TokenType::GREATER_EQUAL => Ok(Value::Bool(a >= b)),
                    TokenType::LESS => Ok(Value::Bool(a < b)),
                    TokenType::LESS_EQUAL => Ok(Value::Bool(a <= b)),
                    _ => Err(LoxError::runtime(operator, "Invalid binary operator.")),
                }
            }
        }
    }

    fn lookup_variable(&self, id: ExprId, name: &Token) -> Result<Value> {
        match self.locals.get(&id) {
            Some(&distance) => Environment::get_at(&self.environment, distance, name),
            None => self.globals.borrow().get(name),
        }
    }

    /// `super.method`: start at the superclass the resolver bound, then bind
    /// to the current `this`, which lives one scope nearer.
    fn super_method(&self, id: ExprId, keyword: &Token, method: &Token) -> Result<Value> {
        let distance: usize = *self
            .locals
            .get(&id)
            .ok_or_else(|| LoxError::runtime(keyword, "Undefined 'super'."))?;

        let superclass: Rc<LoxClass> =
            match Environment::get_at(&self.environment, distance, keyword)? {
                Value::Class(class) => class,
                _ => return Err(LoxError::runtime(keyword, "Undefined 'super'.")),
            };

        let this_token = Token::new(TokenType::THIS, "this", keyword.line);
        let receiver: Value =
            Environment::get_at(&self.environment, distance.saturating_sub(1), &this_token)?;

        let found: Rc<LoxFunction> = superclass.find_method(&method.lexeme).ok_or_else(|| {
            LoxError::runtime(
                method,
                format!("Undefined property '{}'.", method.lexeme),
            )
        })?;

        Ok(Value::Function(Rc::new(found.bind(receiver))))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Calls
    // ─────────────────────────────────────────────────────────────────────────

    fn call_value(&mut self, callee: Value, paren: &Token, args: Vec<Value>) -> Result<Value> {
        let Some(arity) = callee.arity() else {
            return Err(LoxError::runtime(
                paren,
                "Can only call functions and classes.",
            ));
        };

        if args.len() != arity {
            return Err(LoxError::runtime(
                paren,
                format!("Expected {} arguments but got {}.", arity, args.len()),
            ));
        }

        if self.call_depth >= self.config.max_call_depth {
            debug!("Call depth limit {} reached", self.config.max_call_depth);
            return Err(LoxError::runtime(paren, "Stack overflow."));
        }

        self.call_depth += 1;
        let result: Result<Value> = self.dispatch_call(callee, paren, args);
        self.call_depth -= 1;

        result
    }

    fn dispatch_call(&mut self, callee: Value, paren: &Token, args: Vec<Value>) -> Result<Value> {
        match callee {
            Value::Native(native) => {
                debug!("Calling native function '{}'", native.name);
                (native.func)(&args).map_err(|message| LoxError::runtime(paren, message))
            }

            Value::Function(function) => self.call_function(&function, args),

            Value::Class(class) => self.instantiate(&class, args),

            _ => Err(LoxError::runtime(
                paren,
                "Can only call functions and classes.",
            )),
        }
    }

    /// One new environment per call, parented at the function's closure.
    fn call_function(&mut self, function: &LoxFunction, args: Vec<Value>) -> Result<Value> {
        debug!("Calling user-defined function '{}'", function.name());

        let environment = Environment::nested(&function.closure);

        for (param, arg) in function.declaration.params.iter().zip(args) {
            environment.borrow_mut().define(&param.lexeme, arg);
        }

        let completion: Completion = self.execute_block(&function.declaration.body, environment)?;

        if function.is_initializer {
            return Ok(function.closure.borrow().lookup("this").unwrap_or(Value::Nil));
        }

        match completion {
            Completion::Return(value) => Ok(value),
            _ => Ok(Value::Nil),
        }
    }

    fn instantiate(&mut self, class: &Rc<LoxClass>, args: Vec<Value>) -> Result<Value> {
        debug!("Instantiating '{}'", class.name);

        let instance = Rc::new(LoxInstance::new(Rc::clone(class)));

        if let Some(init) = class.find_method("init") {
            let bound = init.bind(Value::Instance(Rc::clone(&instance)));
            self.call_function(&bound, args)?;
        }

        Ok(Value::Instance(instance))
    }

    fn is_truthy(&self, value: &Value) -> bool {
        match value {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Number(n) if self.config.truthiness == Truthiness::Loose => *n != 0.0,
            Value::String(s) if self.config.truthiness == Truthiness::Loose => !s.is_empty(),
            _ => true,
        }
    }
}

/// Property read on an instance (fields, then bound methods up the
/// superclass chain) or on a class (static fields, then static methods).
fn get_property(object: &Value, name: &Token) -> Result<Value> {
    let found: Option<Value> = match object {
        Value::Instance(instance) => instance.get_field(&name.lexeme).or_else(|| {
            instance
                .class
                .find_method(&name.lexeme)
                .map(|method| Value::Function(Rc::new(method.bind(object.clone()))))
        }),

        Value::Class(class) => class.get_field(&name.lexeme).or_else(|| {
            class
                .find_static(&name.lexeme)
                .map(|method| Value::Function(Rc::new(method.bind(object.clone()))))
        }),

        _ => return Err(LoxError::runtime(name, "Only instances have properties.")),
    };

    found.ok_or_else(|| {
        LoxError::runtime(name, format!("Undefined property '{}'.", name.lexeme))
    })
}

/// `+=` / `-=`: numbers only.
fn compound(operator: &Token, current: Value, rhs: Value) -> Result<Value> {
    let (a, b) = number_operands(operator, &current, &rhs)?;

    match operator.token_type {
        TokenType::PLUS_EQUAL => Ok(Value::Number(a + b)),
        TokenType::MINUS_EQUAL => Ok(Value::Number(a - b)),
        _ => Err(LoxError::runtime(operator, "Invalid assignment operator.")),
    }
}

fn number_operands(operator: &Token, left: &Value, right: &Value) -> Result<(f64, f64)> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok((*a, *b)),
        _ => Err(LoxError::runtime(operator, "Operands must be numbers.")),
    }
}

fn natives() -> Vec<NativeFunction> {
    vec![
        NativeFunction {
            name: "clock",
            arity: 0,
            func: |_args: &[Value]| {
                let seconds: f64 = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map_err(|e: SystemTimeError| format!("Clock error: {}", e))?
                    .as_secs_f64();

                Ok(Value::Number(seconds))
            },
        },
        NativeFunction {
            name: "getClass",
            arity: 1,
            func: |args: &[Value]| match args.first() {
                Some(Value::Instance(instance)) => Ok(Value::Class(Rc::clone(&instance.class))),
                _ => Ok(Value::Nil),
            },
        },
    ]
}
