//! Depth-first walk over the oxc AST with an ancestor stack.
//!
//! Visitors see every node twice (`enter` / `leave`) together with the chain
//! of ancestors from the program down to, but excluding, the node itself.

use oxc_ast::ast::{
    Argument, ArrayExpressionElement, BindingPattern, BindingPatternKind, BlockStatement,
    CallExpression, ChainElement, Class, ClassElement, Declaration, ExportDefaultDeclarationKind,
    Expression, ForStatementInit, ForStatementLeft, FormalParameters, Function, FunctionBody,
    JSXAttributeItem, JSXAttributeValue, JSXChild, JSXElement, JSXExpression, MemberExpression,
    ObjectProperty, ObjectPropertyKind, Program, Statement, SwitchCase, TSEnumDeclaration,
    VariableDeclaration,
};
use oxc_span::{GetSpan, Span};

#[derive(Debug, Clone, Copy)]
pub enum Node<'n, 'a> {
    Program(&'n Program<'a>),
    Statement(&'n Statement<'a>),
    Expression(&'n Expression<'a>),
    /// Try / catch / finally blocks, which are not statements themselves.
    Block(&'n BlockStatement<'a>),
    Function(&'n Function<'a>),
    FunctionBody(&'n FunctionBody<'a>),
    SwitchCase(&'n SwitchCase<'a>),
    VariableDeclaration(&'n VariableDeclaration<'a>),
    ObjectProperty(&'n ObjectProperty<'a>),
    /// Member expression on the left of an assignment or under `++` / `--`.
    WriteTarget(&'n MemberExpression<'a>),
    /// Outermost member link of an optional chain.
    ChainMember(&'n MemberExpression<'a>),
    /// Outermost call link of an optional chain.
    ChainCall(&'n CallExpression<'a>),
    JSXElement(&'n JSXElement<'a>),
}

impl<'n, 'a> Node<'n, 'a> {
    pub fn span(&self) -> Span {
        match self {
            Node::Program(p) => p.span,
            Node::Statement(s) => s.span(),
            Node::Expression(e) => e.span(),
            Node::Block(b) => b.span,
            Node::Function(f) => f.span,
            Node::FunctionBody(b) => b.span,
            Node::SwitchCase(c) => c.span,
            Node::VariableDeclaration(d) => d.span,
            Node::ObjectProperty(p) => p.span,
            Node::WriteTarget(m) | Node::ChainMember(m) => m.span(),
            Node::ChainCall(c) => c.span,
            Node::JSXElement(e) => e.span,
        }
    }

    /// Statement list held directly by this node, if it is a container.
    pub fn statements(&self) -> Option<&'n [Statement<'a>]> {
        match *self {
            Node::Program(p) => Some(&p.body[..]),
            Node::Statement(Statement::BlockStatement(b)) => Some(&b.body[..]),
            Node::Block(b) => Some(&b.body[..]),
            Node::FunctionBody(b) => Some(&b.statements[..]),
            Node::SwitchCase(c) => Some(&c.consequent[..]),
            _ => None,
        }
    }

    /// Functions and arrows: code below runs at a different time.
    pub fn is_function_boundary(&self) -> bool {
        matches!(
            self,
            Node::Function(_) | Node::Expression(Expression::ArrowFunctionExpression(_))
        )
    }

    pub fn as_expression(&self) -> Option<&'n Expression<'a>> {
        match *self {
            Node::Expression(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_statement(&self) -> Option<&'n Statement<'a>> {
        match *self {
            Node::Statement(s) => Some(s),
            _ => None,
        }
    }
}

pub trait NodeVisitor<'n, 'a> {
    fn enter(&mut self, _node: Node<'n, 'a>, _ancestors: &[Node<'n, 'a>]) {}
    fn leave(&mut self, _node: Node<'n, 'a>, _ancestors: &[Node<'n, 'a>]) {}
}

pub fn walk_program<'n, 'a, V: NodeVisitor<'n, 'a>>(program: &'n Program<'a>, visitor: &mut V) {
    let mut walker = Walker {
        stack: Vec::with_capacity(64),
        visitor,
    };
    walker.with(Node::Program(program), |w| w.statements(&program.body));
}

struct Walker<'n, 'a, 'v, V> {
    stack: Vec<Node<'n, 'a>>,
    visitor: &'v mut V,
}

impl<'n, 'a, 'v, V: NodeVisitor<'n, 'a>> Walker<'n, 'a, 'v, V> {
    fn with(&mut self, node: Node<'n, 'a>, children: impl FnOnce(&mut Self)) {
        self.visitor.enter(node, &self.stack);
        self.stack.push(node);
        children(self);
        self.stack.pop();
        self.visitor.leave(node, &self.stack);
    }

    fn statements(&mut self, stmts: &'n [Statement<'a>]) {
        for stmt in stmts {
            self.statement(stmt);
        }
    }

    fn statement(&mut self, stmt: &'n Statement<'a>) {
        self.with(Node::Statement(stmt), |w| match stmt {
            Statement::BlockStatement(b) => w.statements(&b.body),
            Statement::ExpressionStatement(s) => w.expression(&s.expression),
            Statement::IfStatement(s) => {
                w.expression(&s.test);
                w.statement(&s.consequent);
                if let Some(alternate) = &s.alternate {
                    w.statement(alternate);
                }
            }
            Statement::ReturnStatement(s) => {
                if let Some(argument) = &s.argument {
                    w.expression(argument);
                }
            }
            Statement::ThrowStatement(s) => w.expression(&s.argument),
            Statement::VariableDeclaration(d) => w.variable_declaration(d),
            Statement::FunctionDeclaration(f) => w.function(f),
            Statement::ClassDeclaration(c) => w.class(c),
            Statement::ForStatement(s) => {
                if let Some(init) = &s.init {
                    match init {
                        ForStatementInit::VariableDeclaration(d) => w.variable_declaration(d),
                        other => {
                            if let Some(e) = other.as_expression() {
                                w.expression(e);
                            }
                        }
                    }
                }
                if let Some(test) = &s.test {
                    w.expression(test);
                }
                if let Some(update) = &s.update {
                    w.expression(update);
                }
                w.statement(&s.body);
            }
            Statement::ForInStatement(s) => {
                w.for_left(&s.left);
                w.expression(&s.right);
                w.statement(&s.body);
            }
            Statement::ForOfStatement(s) => {
                w.for_left(&s.left);
                w.expression(&s.right);
                w.statement(&s.body);
            }
            Statement::WhileStatement(s) => {
                w.expression(&s.test);
                w.statement(&s.body);
            }
            Statement::DoWhileStatement(s) => {
                w.statement(&s.body);
                w.expression(&s.test);
            }
            Statement::SwitchStatement(s) => {
                w.expression(&s.discriminant);
                for case in &s.cases {
                    w.with(Node::SwitchCase(case), |w| {
                        if let Some(test) = &case.test {
                            w.expression(test);
                        }
                        w.statements(&case.consequent);
                    });
                }
            }
            Statement::TryStatement(s) => {
                w.block(&s.block);
                if let Some(handler) = &s.handler {
                    w.block(&handler.body);
                }
                if let Some(finalizer) = &s.finalizer {
                    w.block(finalizer);
                }
            }
            Statement::LabeledStatement(s) => w.statement(&s.body),
            Statement::WithStatement(s) => {
                w.expression(&s.object);
                w.statement(&s.body);
            }
            Statement::TSEnumDeclaration(e) => w.enum_members(e),
            Statement::ExportNamedDeclaration(e) => {
                if let Some(declaration) = &e.declaration {
                    w.declaration(declaration);
                }
            }
            Statement::ExportDefaultDeclaration(e) => match &e.declaration {
                ExportDefaultDeclarationKind::FunctionDeclaration(f) => w.function(f),
                ExportDefaultDeclarationKind::ClassDeclaration(c) => w.class(c),
                other => {
                    if let Some(e) = other.as_expression() {
                        w.expression(e);
                    }
                }
            },
            _ => {}
        });
    }

    fn block(&mut self, block: &'n BlockStatement<'a>) {
        self.with(Node::Block(block), |w| w.statements(&block.body));
    }

    fn declaration(&mut self, declaration: &'n Declaration<'a>) {
        match declaration {
            Declaration::VariableDeclaration(d) => self.variable_declaration(d),
            Declaration::FunctionDeclaration(f) => self.function(f),
            Declaration::ClassDeclaration(c) => self.class(c),
            Declaration::TSEnumDeclaration(e) => self.enum_members(e),
            _ => {}
        }
    }

    fn for_left(&mut self, left: &'n ForStatementLeft<'a>) {
        if let ForStatementLeft::VariableDeclaration(d) = left {
            self.variable_declaration(d);
        }
    }

    fn variable_declaration(&mut self, declaration: &'n VariableDeclaration<'a>) {
        self.with(Node::VariableDeclaration(declaration), |w| {
            for declarator in &declaration.declarations {
                w.binding_pattern(&declarator.id);
                if let Some(init) = &declarator.init {
                    w.expression(init);
                }
            }
        });
    }

    fn function(&mut self, function: &'n Function<'a>) {
        self.with(Node::Function(function), |w| {
            w.params(&function.params);
            if let Some(body) = &function.body {
                w.function_body(body);
            }
        });
    }

    fn params(&mut self, params: &'n FormalParameters<'a>) {
        for param in &params.items {
            self.binding_pattern(&param.pattern);
        }
        if let Some(rest) = &params.rest {
            self.binding_pattern(&rest.argument);
        }
    }

    /// Only defaults and computed keys hold expressions.
    fn binding_pattern(&mut self, pattern: &'n BindingPattern<'a>) {
        match &pattern.kind {
            BindingPatternKind::BindingIdentifier(_) => {}
            BindingPatternKind::AssignmentPattern(p) => {
                self.binding_pattern(&p.left);
                self.expression(&p.right);
            }
            BindingPatternKind::ObjectPattern(p) => {
                for property in &p.properties {
                    if property.computed {
                        if let Some(key) = property.key.as_expression() {
                            self.expression(key);
                        }
                    }
                    self.binding_pattern(&property.value);
                }
                if let Some(rest) = &p.rest {
                    self.binding_pattern(&rest.argument);
                }
            }
            BindingPatternKind::ArrayPattern(p) => {
                for element in p.elements.iter().flatten() {
                    self.binding_pattern(element);
                }
                if let Some(rest) = &p.rest {
                    self.binding_pattern(&rest.argument);
                }
            }
        }
    }

    fn enum_members(&mut self, declaration: &'n TSEnumDeclaration<'a>) {
        for member in &declaration.body.members {
            if let Some(initializer) = &member.initializer {
                self.expression(initializer);
            }
        }
    }

    fn function_body(&mut self, body: &'n FunctionBody<'a>) {
        self.with(Node::FunctionBody(body), |w| w.statements(&body.statements));
    }

    fn class(&mut self, class: &'n Class<'a>) {
        if let Some(super_class) = &class.super_class {
            self.expression(super_class);
        }
        for element in &class.body.body {
            match element {
                ClassElement::MethodDefinition(m) => self.function(&m.value),
                ClassElement::PropertyDefinition(p) => {
                    if let Some(value) = &p.value {
                        self.expression(value);
                    }
                }
                ClassElement::AccessorProperty(p) => {
                    if let Some(value) = &p.value {
                        self.expression(value);
                    }
                }
                ClassElement::StaticBlock(s) => self.statements(&s.body),
                _ => {}
            }
        }
    }

    fn arguments(&mut self, arguments: &'n [Argument<'a>]) {
        for argument in arguments {
            match argument {
                Argument::SpreadElement(s) => self.expression(&s.argument),
                other => {
                    if let Some(e) = other.as_expression() {
                        self.expression(e);
                    }
                }
            }
        }
    }

    fn member(&mut self, member: &'n MemberExpression<'a>) {
        match member {
            MemberExpression::ComputedMemberExpression(m) => {
                self.expression(&m.object);
                self.expression(&m.expression);
            }
            MemberExpression::StaticMemberExpression(m) => self.expression(&m.object),
            MemberExpression::PrivateFieldExpression(m) => self.expression(&m.object),
        }
    }

    fn write_target(&mut self, member: &'n MemberExpression<'a>) {
        self.with(Node::WriteTarget(member), |w| w.member(member));
    }

    fn expression(&mut self, expr: &'n Expression<'a>) {
        self.with(Node::Expression(expr), |w| match expr {
            Expression::ArrayExpression(a) => {
                for element in &a.elements {
                    match element {
                        ArrayExpressionElement::SpreadElement(s) => w.expression(&s.argument),
                        ArrayExpressionElement::Elision(_) => {}
                        other => {
                            if let Some(e) = other.as_expression() {
                                w.expression(e);
                            }
                        }
                    }
                }
            }
            Expression::ObjectExpression(o) => {
                for property in &o.properties {
                    match property {
                        ObjectPropertyKind::ObjectProperty(p) => {
                            w.with(Node::ObjectProperty(p), |w| {
                                if p.computed {
                                    if let Some(key) = p.key.as_expression() {
                                        w.expression(key);
                                    }
                                }
                                w.expression(&p.value);
                            });
                        }
                        ObjectPropertyKind::SpreadProperty(s) => w.expression(&s.argument),
                    }
                }
            }
            Expression::AssignmentExpression(a) => {
                if let Some(member) = a
                    .left
                    .as_simple_assignment_target()
                    .and_then(|t| t.as_member_expression())
                {
                    w.write_target(member);
                }
                w.expression(&a.right);
            }
            Expression::UpdateExpression(u) => {
                if let Some(member) = u.argument.as_member_expression() {
                    w.write_target(member);
                }
            }
            Expression::ArrowFunctionExpression(f) => {
                w.params(&f.params);
                if f.expression {
                    if let Some(Statement::ExpressionStatement(s)) = f.body.statements.first() {
                        w.expression(&s.expression);
                    }
                } else {
                    w.function_body(&f.body);
                }
            }
            Expression::FunctionExpression(f) => w.function(f),
            Expression::ClassExpression(c) => w.class(c),
            Expression::AwaitExpression(a) => w.expression(&a.argument),
            Expression::YieldExpression(y) => {
                if let Some(argument) = &y.argument {
                    w.expression(argument);
                }
            }
            Expression::BinaryExpression(b) => {
                w.expression(&b.left);
                w.expression(&b.right);
            }
            Expression::LogicalExpression(l) => {
                w.expression(&l.left);
                w.expression(&l.right);
            }
            Expression::ConditionalExpression(c) => {
                w.expression(&c.test);
                w.expression(&c.consequent);
                w.expression(&c.alternate);
            }
            Expression::UnaryExpression(u) => w.expression(&u.argument),
            Expression::SequenceExpression(s) => {
                for e in &s.expressions {
                    w.expression(e);
                }
            }
            Expression::ParenthesizedExpression(p) => w.expression(&p.expression),
            Expression::CallExpression(c) => {
                w.expression(&c.callee);
                w.arguments(&c.arguments);
            }
            Expression::NewExpression(n) => {
                w.expression(&n.callee);
                w.arguments(&n.arguments);
            }
            Expression::ChainExpression(c) => match &c.expression {
                ChainElement::CallExpression(call) => {
                    w.with(Node::ChainCall(call), |w| {
                        w.expression(&call.callee);
                        w.arguments(&call.arguments);
                    });
                }
                ChainElement::TSNonNullExpression(t) => w.expression(&t.expression),
                other => {
                    if let Some(member) = other.as_member_expression() {
                        w.with(Node::ChainMember(member), |w| w.member(member));
                    }
                }
            },
            Expression::StaticMemberExpression(m) => w.expression(&m.object),
            Expression::ComputedMemberExpression(m) => {
                w.expression(&m.object);
                w.expression(&m.expression);
            }
            Expression::PrivateFieldExpression(m) => w.expression(&m.object),
            Expression::TemplateLiteral(t) => {
                for e in &t.expressions {
                    w.expression(e);
                }
            }
            Expression::TaggedTemplateExpression(t) => {
                w.expression(&t.tag);
                for e in &t.quasi.expressions {
                    w.expression(e);
                }
            }
            Expression::ImportExpression(i) => w.expression(&i.source),
            Expression::JSXElement(el) => w.jsx_element(el),
            Expression::JSXFragment(f) => w.jsx_children(&f.children),
            Expression::TSAsExpression(t) => w.expression(&t.expression),
            Expression::TSSatisfiesExpression(t) => w.expression(&t.expression),
            Expression::TSNonNullExpression(t) => w.expression(&t.expression),
            Expression::TSTypeAssertion(t) => w.expression(&t.expression),
            Expression::TSInstantiationExpression(t) => w.expression(&t.expression),
            _ => {}
        });
    }

    fn jsx_element(&mut self, element: &'n JSXElement<'a>) {
        self.with(Node::JSXElement(element), |w| {
            for item in &element.opening_element.attributes {
                match item {
                    JSXAttributeItem::Attribute(attr) => match &attr.value {
                        Some(JSXAttributeValue::ExpressionContainer(c)) => w.jsx_expression(&c.expression),
                        Some(JSXAttributeValue::Element(e)) => w.jsx_element(e),
                        Some(JSXAttributeValue::Fragment(f)) => w.jsx_children(&f.children),
                        Some(JSXAttributeValue::StringLiteral(_)) | None => {}
                    },
                    JSXAttributeItem::SpreadAttribute(s) => w.expression(&s.argument),
                }
            }
            w.jsx_children(&element.children);
        });
    }

    fn jsx_children(&mut self, children: &'n [JSXChild<'a>]) {
        for child in children {
            match child {
                JSXChild::Element(e) => self.jsx_element(e),
                JSXChild::Fragment(f) => self.jsx_children(&f.children),
                JSXChild::ExpressionContainer(c) => self.jsx_expression(&c.expression),
                JSXChild::Spread(s) => self.expression(&s.expression),
                JSXChild::Text(_) => {}
            }
        }
    }

    fn jsx_expression(&mut self, expr: &'n JSXExpression<'a>) {
        if let Some(e) = expr.as_expression() {
            self.expression(e);
        }
    }
}
