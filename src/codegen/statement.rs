//! Statement lowering
//!
//! One case per [StatementKind]. Anything that can leave the current basic
//! block terminated is followed by a termination check before more
//! instructions are appended; see [Codegen::current_block_terminated].

use inkwell::types::{BasicType, BasicTypeEnum};
use inkwell::values::BasicValueEnum;
use inkwell::AddressSpace;

use crate::ast::{Block, Expression, ExpressionKind, FunctionDecl, Statement, StatementKind, TypeDecl};
use crate::Span;

use super::{Codegen, CodegenError, Result, StructInfo, SymbolEntry};

impl<'ctx> Codegen<'ctx> {
    pub(crate) fn lower_statement(&mut self, stmt: &Statement) -> Result<()> {
        log::trace!("lowering statement {:?}", std::mem::discriminant(&stmt.kind));

        match &stmt.kind {
            // Package clauses emit no IR
            StatementKind::Package { .. } => Ok(()),
            StatementKind::Let { name, value } => self.lower_binding(name, value, false, stmt.span),
            StatementKind::Const { name, value } => self.lower_const(name, value, stmt.span),
            StatementKind::Return { value } => self.lower_return(value.as_ref(), stmt.span),
            StatementKind::Expression(expr) => {
                self.require_block(stmt.span)?;
                self.lower_expression(expr)?;
                Ok(())
            }
            StatementKind::Block(block) => {
                self.require_block(stmt.span)?;
                self.lower_block(block)
            }
            StatementKind::FunctionDecl(decl) => self.lower_function_declaration(decl),
            StatementKind::TypeDecl(decl) => self.lower_type_declaration(decl),
            StatementKind::While { condition, body } => self.lower_while(condition, body, stmt.span),
            StatementKind::Break => match self.loop_end {
                Some(end) => {
                    self.builder.build_unconditional_branch(end)?;
                    Ok(())
                }
                None => Err(CodegenError::BreakOutsideLoop { span: stmt.span }),
            },
            StatementKind::Continue => match self.loop_cond {
                Some(cond) => {
                    self.builder.build_unconditional_branch(cond)?;
                    Ok(())
                }
                None => Err(CodegenError::ContinueOutsideLoop { span: stmt.span }),
            },
        }
    }

    /// Push a scope, lower the block's children, pop the scope. Lowering
    /// stops early once the current block picked up a terminator.
    pub(crate) fn lower_block(&mut self, block: &Block) -> Result<()> {
        self.symbols.push_scope();
        let result = self.lower_block_statements(block);
        self.symbols.pop_scope();
        result
    }

    fn lower_block_statements(&mut self, block: &Block) -> Result<()> {
        for stmt in &block.statements {
            self.lower_statement(stmt)?;
            if self.current_block_terminated() {
                break;
            }
        }
        Ok(())
    }

    /// `let` and the non-constant-value arm of `const` share this shape
    fn lower_binding(
        &mut self,
        name: &str,
        value: &Expression,
        is_literal: bool,
        span: Span,
    ) -> Result<()> {
        self.require_block(span)?;

        // Array literals keep their aggregate type on the symbol so indexing
        // can GEP through the stored pointer later
        if let ExpressionKind::Array(elements) = &value.kind {
            let (array_ptr, array_type) = self.lower_array_literal(elements, value.span)?;
            let ptr_type = array_type.ptr_type(AddressSpace::default());
            let slot = self.builder.build_alloca(ptr_type, name)?;
            self.builder.build_store(slot, array_ptr)?;

            let mut entry = SymbolEntry::variable(slot, ptr_type.into());
            entry.array_type = Some(array_type);
            entry.is_literal = is_literal;
            self.symbols.set(name, entry);
            return Ok(());
        }

        let value_ir = self.lower_to_value(value)?;
        let ty = value_ir.get_type();
        let ptr = self.builder.build_alloca(ty, name)?;
        self.builder.build_store(ptr, value_ir)?;

        let mut entry = SymbolEntry::variable(ptr, ty);
        if let ExpressionKind::Composite { type_name, .. } = &value.kind {
            entry.type_name = Some(type_name.clone());
        }
        entry.is_literal = is_literal;
        self.symbols.set(name, entry);
        Ok(())
    }

    /// Compile-time-constant `const` values are recorded inline without an
    /// `alloca`; anything else becomes a frozen variable.
    fn lower_const(&mut self, name: &str, value: &Expression, span: Span) -> Result<()> {
        // Outside of any function there is no block to emit into, so only
        // literal integers and booleans can be bound
        if self.builder.get_insert_block().is_none() {
            let entry = match value.kind {
                ExpressionKind::Integer(n) => {
                    let int = self.context.i32_type().const_int(n as u64, true);
                    SymbolEntry::constant(int.into(), self.context.i32_type().into())
                }
                ExpressionKind::Boolean(b) => {
                    let int = self.context.bool_type().const_int(b as u64, false);
                    SymbolEntry::constant(int.into(), self.context.bool_type().into())
                }
                _ => return Err(CodegenError::OutsideFunction { span }),
            };
            self.symbols.set(name, entry);
            return Ok(());
        }

        // Arrays go through the binding path so the aggregate type lands on
        // the symbol entry
        if matches!(value.kind, ExpressionKind::Array(_)) {
            return self.lower_binding(name, value, true, span);
        }

        let value_ir = self.lower_to_value(value)?;
        if is_compile_time_constant(value_ir) {
            self.symbols
                .set(name, SymbolEntry::constant(value_ir, value_ir.get_type()));
            return Ok(());
        }

        // Not a constant value: freeze it behind an alloca like `let`, but
        // reuse the value lowered above instead of lowering twice
        let ty = value_ir.get_type();
        let ptr = self.builder.build_alloca(ty, name)?;
        self.builder.build_store(ptr, value_ir)?;

        let mut entry = SymbolEntry::variable(ptr, ty);
        if let ExpressionKind::Composite { type_name, .. } = &value.kind {
            entry.type_name = Some(type_name.clone());
        }
        entry.is_literal = true;
        self.symbols.set(name, entry);
        Ok(())
    }

    fn lower_return(&mut self, value: Option<&Expression>, span: Span) -> Result<()> {
        self.require_block(span)?;

        match value {
            Some(expr) => {
                let mut value_ir = self.lower_to_value(expr)?;
                if let Some(expected) = self.current_return_type {
                    value_ir = self.widen_to(value_ir, expected)?;
                }
                self.builder.build_return(Some(&value_ir))?;
            }
            None => {
                // A bare `return` in a value-returning function falls back to
                // the zero of that type so the block still terminates validly
                match self.current_return_type {
                    Some(BasicTypeEnum::IntType(ty)) => {
                        self.builder.build_return(Some(&ty.const_zero()))?;
                    }
                    Some(BasicTypeEnum::PointerType(ty)) => {
                        self.builder.build_return(Some(&ty.const_null()))?;
                    }
                    _ => {
                        self.builder.build_return(None)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn lower_while(&mut self, condition: &Expression, body: &Block, span: Span) -> Result<()> {
        let function = self.active_function(span)?;

        let cond_block = self.context.append_basic_block(function, "loop_cond");
        let body_block = self.context.append_basic_block(function, "loop_body");
        let end_block = self.context.append_basic_block(function, "loop_end");

        self.builder.build_unconditional_branch(cond_block)?;

        self.builder.position_at_end(cond_block);
        let cond_value = self.lower_to_value(condition)?;
        let cond = self.as_condition(cond_value, condition.span)?;
        self.builder
            .build_conditional_branch(cond, body_block, end_block)?;

        // Save the enclosing loop's targets so nesting restores them
        let saved_cond = self.loop_cond.replace(cond_block);
        let saved_end = self.loop_end.replace(end_block);

        self.builder.position_at_end(body_block);
        self.lower_block(body)?;
        if !self.current_block_terminated() {
            self.builder.build_unconditional_branch(cond_block)?;
        }

        self.loop_cond = saved_cond;
        self.loop_end = saved_end;

        self.builder.position_at_end(end_block);
        Ok(())
    }

    pub(crate) fn lower_function_declaration(&mut self, decl: &FunctionDecl) -> Result<()> {
        log::debug!("lowering function `{}`", decl.name);

        let param_types = decl
            .params
            .iter()
            .map(|param| match &param.type_annotation {
                Some(name) => self.lookup_type(name, param.span),
                None => Ok(self.context.i32_type().into()),
            })
            .collect::<Result<Vec<BasicTypeEnum>>>()?;

        // `main` always returns i32 regardless of annotations
        let return_type: BasicTypeEnum = if decl.name == "main" {
            self.context.i32_type().into()
        } else {
            match &decl.return_type {
                Some(name) => self.lookup_type(name, decl.span)?,
                None => self.context.i32_type().into(),
            }
        };

        let metadata_params: Vec<_> = param_types.iter().map(|ty| (*ty).into()).collect();
        let fn_type = return_type.fn_type(&metadata_params, false);
        let function = self.module.add_function(&decl.name, fn_type, None);

        let Some(body) = &decl.body else {
            return Ok(());
        };

        let saved_block = self.builder.get_insert_block();
        let saved_return = self.current_return_type.replace(return_type);

        let entry = self.context.append_basic_block(function, "entry");
        self.builder.position_at_end(entry);
        self.symbols.push_scope();

        for (i, param) in decl.params.iter().enumerate() {
            let arg = function
                .get_nth_param(i as u32)
                .expect("arity fixed above");
            arg.set_name(&param.name);

            let ptr = self.builder.build_alloca(param_types[i], &param.name)?;
            self.builder.build_store(ptr, arg)?;

            let mut entry = SymbolEntry::variable(ptr, param_types[i]);
            entry.type_name = param.type_annotation.clone();
            self.symbols.set(&param.name, entry);
        }

        self.lower_block(body)?;

        self.symbols.pop_scope();

        if !self.current_block_terminated() {
            self.emit_default_return(return_type)?;
        }

        self.current_return_type = saved_return;
        if let Some(block) = saved_block {
            self.builder.position_at_end(block);
        } else {
            self.builder.clear_insertion_position();
        }
        Ok(())
    }

    fn emit_default_return(&mut self, return_type: BasicTypeEnum<'ctx>) -> Result<()> {
        match return_type {
            BasicTypeEnum::IntType(ty) => {
                self.builder.build_return(Some(&ty.const_zero()))?;
            }
            BasicTypeEnum::PointerType(ty) => {
                self.builder.build_return(Some(&ty.const_null()))?;
            }
            _ => {
                self.builder.build_return(None)?;
            }
        }
        Ok(())
    }

    fn lower_type_declaration(&mut self, decl: &TypeDecl) -> Result<()> {
        log::debug!("lowering type `{}`", decl.name);

        // Register the opaque type first so fields and methods may refer to
        // the type being declared
        let struct_type = self.context.opaque_struct_type(&decl.name);
        self.structs.insert(
            decl.name.clone(),
            StructInfo {
                ty: struct_type,
                fields: Vec::new(),
                indices: Default::default(),
            },
        );

        let mut info = StructInfo {
            ty: struct_type,
            fields: Vec::with_capacity(decl.fields.len()),
            indices: Default::default(),
        };
        let mut field_types = Vec::with_capacity(decl.fields.len());
        for (i, field) in decl.fields.iter().enumerate() {
            let ty = self.lookup_type(&field.type_name, field.span)?;
            field_types.push(ty);
            info.fields.push((field.name.clone(), ty));
            info.indices.insert(field.name.clone(), i as u32);
        }
        struct_type.set_body(&field_types, false);
        self.structs.insert(decl.name.clone(), info.clone());

        self.emit_constructor(&decl.name, &info)?;
        for method in &decl.methods {
            self.emit_method(&decl.name, &info, method)?;
        }
        Ok(())
    }

    /// `Name.constructor(self, field0, field1, ...)` stores every argument
    /// into the matching slot of the pointed-to instance
    fn emit_constructor(&mut self, type_name: &str, info: &StructInfo<'ctx>) -> Result<()> {
        let ptr_type = info.ty.ptr_type(AddressSpace::default());

        let mut param_types = vec![ptr_type.into()];
        param_types.extend(info.fields.iter().map(|(_, ty)| (*ty).into()));
        let fn_type = self.context.void_type().fn_type(&param_types, false);

        let function = self
            .module
            .add_function(&format!("{type_name}.constructor"), fn_type, None);

        let saved_block = self.builder.get_insert_block();
        let entry = self.context.append_basic_block(function, "entry");
        self.builder.position_at_end(entry);

        let self_ptr = function
            .get_nth_param(0)
            .expect("constructor has a self parameter")
            .into_pointer_value();
        self_ptr.set_name("self");

        for (i, (field_name, _)) in info.fields.iter().enumerate() {
            let arg = function
                .get_nth_param(i as u32 + 1)
                .expect("one parameter per field");
            arg.set_name(field_name);

            let field_ptr = self.builder.build_struct_gep(
                self_ptr,
                i as u32,
                &format!("{field_name}_ptr"),
            )?;
            self.builder.build_store(field_ptr, arg)?;
        }
        self.builder.build_return(None)?;

        if let Some(block) = saved_block {
            self.builder.position_at_end(block);
        } else {
            self.builder.clear_insertion_position();
        }
        Ok(())
    }

    /// `Name.method(self, ...fields..., ...params...)`; the body sees every
    /// field as a local variable
    fn emit_method(
        &mut self,
        type_name: &str,
        info: &StructInfo<'ctx>,
        method: &FunctionDecl,
    ) -> Result<()> {
        log::debug!("lowering method `{type_name}.{}`", method.name);

        let ptr_type = info.ty.ptr_type(AddressSpace::default());

        let explicit_types = method
            .params
            .iter()
            .map(|param| match &param.type_annotation {
                Some(name) => self.lookup_type(name, param.span),
                None => Ok(self.context.i32_type().into()),
            })
            .collect::<Result<Vec<BasicTypeEnum>>>()?;

        let mut param_types = vec![ptr_type.into()];
        param_types.extend(info.fields.iter().map(|(_, ty)| (*ty).into()));
        param_types.extend(explicit_types.iter().map(|ty| (*ty).into()));

        let return_type: BasicTypeEnum = match &method.return_type {
            Some(name) => self.lookup_type(name, method.span)?,
            None => self.context.i32_type().into(),
        };
        let fn_type = return_type.fn_type(&param_types, false);

        let function = self
            .module
            .add_function(&format!("{type_name}.{}", method.name), fn_type, None);

        let Some(body) = &method.body else {
            return Ok(());
        };

        let saved_block = self.builder.get_insert_block();
        let saved_return = self.current_return_type.replace(return_type);

        let entry = self.context.append_basic_block(function, "entry");
        self.builder.position_at_end(entry);
        self.symbols.push_scope();

        let self_ptr = function
            .get_nth_param(0)
            .expect("method has a self parameter")
            .into_pointer_value();
        self_ptr.set_name("self");

        for (i, (field_name, field_type)) in info.fields.iter().enumerate() {
            let arg = function
                .get_nth_param(i as u32 + 1)
                .expect("one parameter per field");
            arg.set_name(field_name);

            let ptr = self.builder.build_alloca(*field_type, field_name)?;
            self.builder.build_store(ptr, arg)?;
            self.symbols
                .set(field_name, SymbolEntry::variable(ptr, *field_type));
        }

        let field_count = info.fields.len() as u32;
        for (i, param) in method.params.iter().enumerate() {
            let arg = function
                .get_nth_param(field_count + 1 + i as u32)
                .expect("arity fixed above");
            arg.set_name(&param.name);

            let ptr = self.builder.build_alloca(explicit_types[i], &param.name)?;
            self.builder.build_store(ptr, arg)?;

            let mut entry = SymbolEntry::variable(ptr, explicit_types[i]);
            entry.type_name = param.type_annotation.clone();
            self.symbols.set(&param.name, entry);
        }

        self.lower_block(body)?;

        self.symbols.pop_scope();

        if !self.current_block_terminated() {
            self.emit_default_return(return_type)?;
        }

        self.current_return_type = saved_return;
        if let Some(block) = saved_block {
            self.builder.position_at_end(block);
        } else {
            self.builder.clear_insertion_position();
        }
        Ok(())
    }
}

fn is_compile_time_constant(value: BasicValueEnum<'_>) -> bool {
    match value {
        BasicValueEnum::IntValue(int) => int.is_const(),
        BasicValueEnum::PointerValue(ptr) => ptr.is_const(),
        _ => false,
    }
}
