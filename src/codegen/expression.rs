//! Expression lowering
//!
//! One case per [ExpressionKind]. Lowering returns `Option<BasicValueEnum>`:
//! `None` is the void sentinel produced by `if` (a statement in practice);
//! [Codegen::lower_to_value] is the entry for positions that require a value.

use inkwell::types::{ArrayType, BasicTypeEnum};
use inkwell::values::{BasicMetadataValueEnum, BasicValueEnum, FunctionValue, PointerValue};

use crate::ast::{Block, Expression, ExpressionKind, InfixOp, PrefixOp};
use crate::Span;

use super::{Codegen, CodegenError, Result};

impl<'ctx> Codegen<'ctx> {
    pub(crate) fn lower_expression(
        &mut self,
        expr: &Expression,
    ) -> Result<Option<BasicValueEnum<'ctx>>> {
        log::trace!("lowering expression {:?}", std::mem::discriminant(&expr.kind));

        match &expr.kind {
            ExpressionKind::Integer(value) => {
                let int = self.context.i32_type().const_int(*value as u64, true);
                Ok(Some(int.into()))
            }
            ExpressionKind::String(value) => {
                // A NUL-terminated global array of bytes, handed out as ptr
                let global = self.builder.build_global_string_ptr(value, "str_literal")?;
                Ok(Some(global.as_pointer_value().into()))
            }
            ExpressionKind::Boolean(value) => {
                let int = self.context.bool_type().const_int(*value as u64, false);
                Ok(Some(int.into()))
            }
            ExpressionKind::Identifier(name) => self.lower_identifier(name, expr.span).map(Some),
            ExpressionKind::Prefix { op, right } => {
                let value = self.lower_to_value(right)?;
                let value = self.expect_int(value, right.span)?;
                let result = match op {
                    PrefixOp::Neg => self.builder.build_int_neg(value, "neg")?,
                    PrefixOp::Not => self.builder.build_not(value, "not")?,
                };
                Ok(Some(result.into()))
            }
            ExpressionKind::Infix { op, left, right } => {
                self.lower_infix(*op, left, right, expr.span).map(Some)
            }
            ExpressionKind::If {
                condition,
                consequence,
                alternative,
            } => {
                self.lower_if(condition, consequence, alternative.as_ref(), expr.span)?;
                Ok(None)
            }
            ExpressionKind::Call { callee, arguments } => {
                self.lower_call(callee, arguments, expr.span)
            }
            ExpressionKind::Index { array, index } => {
                let ExpressionKind::Identifier(name) = &array.kind else {
                    return Err(CodegenError::UnsupportedIndexTarget { span: array.span });
                };
                let (element_ptr, _element_type) =
                    self.lower_element_ptr(name, index, array.span)?;
                let value = self
                    .builder
                    .build_load(element_ptr, "element")?;
                Ok(Some(value))
            }
            ExpressionKind::Member { object, property } => {
                self.lower_member(object, property, expr.span).map(Some)
            }
            ExpressionKind::Array(elements) => {
                let (ptr, _) = self.lower_array_literal(elements, expr.span)?;
                Ok(Some(ptr.into()))
            }
            ExpressionKind::Composite { type_name, fields } => self
                .lower_composite_literal(type_name, fields, expr.span)
                .map(Some),
            ExpressionKind::FunctionLiteral { .. } => {
                Err(CodegenError::UnsupportedFunctionLiteral { span: expr.span })
            }
            ExpressionKind::Assignment { target, value } => {
                self.lower_assignment(target, value).map(Some)
            }
        }
    }

    /// Lower an expression that must produce a value
    pub(crate) fn lower_to_value(&mut self, expr: &Expression) -> Result<BasicValueEnum<'ctx>> {
        self.lower_expression(expr)?
            .ok_or(CodegenError::VoidValue { span: expr.span })
    }

    fn lower_identifier(&mut self, name: &str, span: Span) -> Result<BasicValueEnum<'ctx>> {
        let entry = self
            .symbols
            .get(name)
            .ok_or_else(|| CodegenError::UndefinedSymbol {
                name: name.to_string(),
                span,
            })?
            .clone();

        if entry.is_literal {
            if let Some(value) = entry.value {
                return Ok(value);
            }
        }

        let ptr = entry.ptr.expect("non-inline symbols have storage");
        Ok(self.builder.build_load(ptr, name)?)
    }

    fn lower_infix(
        &mut self,
        op: InfixOp,
        left: &Expression,
        right: &Expression,
        span: Span,
    ) -> Result<BasicValueEnum<'ctx>> {
        let lhs = self.lower_to_value(left)?;
        let rhs = self.lower_to_value(right)?;

        // `+` on two pointers is string concatenation
        if op == InfixOp::Add && lhs.is_pointer_value() && rhs.is_pointer_value() {
            let buffer = self
                .lower_string_concat(lhs.into_pointer_value(), rhs.into_pointer_value())?;
            return Ok(buffer.into());
        }

        let lhs = self.expect_int(lhs, left.span)?;
        let rhs = self.expect_int(rhs, right.span)?;
        if lhs.get_type().get_bit_width() != rhs.get_type().get_bit_width() {
            return Err(CodegenError::MixedIntWidths { span });
        }

        use inkwell::IntPredicate::{EQ, NE, SGT, SLT};
        let result = match op {
            InfixOp::Add => self.builder.build_int_add(lhs, rhs, "add")?,
            InfixOp::Sub => self.builder.build_int_sub(lhs, rhs, "sub")?,
            InfixOp::Mul => self.builder.build_int_mul(lhs, rhs, "mul")?,
            InfixOp::Div => self.builder.build_int_signed_div(lhs, rhs, "div")?,
            InfixOp::Mod => self.builder.build_int_signed_rem(lhs, rhs, "mod")?,
            InfixOp::Eq => self.builder.build_int_compare(EQ, lhs, rhs, "eq")?,
            InfixOp::NotEq => self.builder.build_int_compare(NE, lhs, rhs, "neq")?,
            InfixOp::Less => self.builder.build_int_compare(SLT, lhs, rhs, "lt")?,
            InfixOp::Greater => self.builder.build_int_compare(SGT, lhs, rhs, "gt")?,
        };
        Ok(result.into())
    }

    /// strlen both sides, allocate length + 1, strcpy then strcat
    fn lower_string_concat(
        &mut self,
        lhs: PointerValue<'ctx>,
        rhs: PointerValue<'ctx>,
    ) -> Result<PointerValue<'ctx>> {
        let len1 = self.call_returning(self.strlen, &[lhs.into()], "len1")?;
        let len2 = self.call_returning(self.strlen, &[rhs.into()], "len2")?;

        let total = self.builder.build_int_add(
            len1.into_int_value(),
            len2.into_int_value(),
            "total_len",
        )?;
        let one = self.context.i64_type().const_int(1, false);
        let size = self.builder.build_int_add(total, one, "buffer_size")?;

        let buffer = self
            .call_returning(self.malloc, &[size.into()], "concat_buffer")?
            .into_pointer_value();

        self.builder
            .build_call(self.strcpy, &[buffer.into(), lhs.into()], "")?;
        self.builder
            .build_call(self.strcat, &[buffer.into(), rhs.into()], "")?;
        Ok(buffer)
    }

    fn lower_if(
        &mut self,
        condition: &Expression,
        consequence: &Block,
        alternative: Option<&Block>,
        span: Span,
    ) -> Result<()> {
        let function = self.active_function(span)?;

        let cond_value = self.lower_to_value(condition)?;
        let cond = self.as_condition(cond_value, condition.span)?;

        let then_block = self.context.append_basic_block(function, "then");
        let else_block = self.context.append_basic_block(function, "else");
        let merge_block = self.context.append_basic_block(function, "merge");

        self.builder
            .build_conditional_branch(cond, then_block, else_block)?;

        self.builder.position_at_end(then_block);
        self.lower_block(consequence)?;
        if !self.current_block_terminated() {
            self.builder.build_unconditional_branch(merge_block)?;
        }

        self.builder.position_at_end(else_block);
        if let Some(alt) = alternative {
            self.lower_block(alt)?;
        }
        if !self.current_block_terminated() {
            self.builder.build_unconditional_branch(merge_block)?;
        }

        self.builder.position_at_end(merge_block);
        Ok(())
    }

    fn lower_assignment(
        &mut self,
        target: &Expression,
        value: &Expression,
    ) -> Result<BasicValueEnum<'ctx>> {
        let value_ir = self.lower_to_value(value)?;

        match &target.kind {
            ExpressionKind::Identifier(name) => {
                let entry = self
                    .symbols
                    .get(name)
                    .ok_or_else(|| CodegenError::UndefinedSymbol {
                        name: name.clone(),
                        span: target.span,
                    })?
                    .clone();
                if entry.is_literal {
                    return Err(CodegenError::AssignToConstant {
                        name: name.clone(),
                        span: target.span,
                    });
                }
                let ptr = entry.ptr.expect("non-inline symbols have storage");
                self.builder.build_store(ptr, value_ir)?;
                Ok(value_ir)
            }
            ExpressionKind::Index { array, index } => {
                let ExpressionKind::Identifier(name) = &array.kind else {
                    return Err(CodegenError::UnsupportedIndexTarget { span: array.span });
                };
                let (element_ptr, _) = self.lower_element_ptr(name, index, array.span)?;
                self.builder.build_store(element_ptr, value_ir)?;
                Ok(value_ir)
            }
            _ => Err(CodegenError::InvalidAssignmentTarget { span: target.span }),
        }
    }

    fn lower_call(
        &mut self,
        callee: &Expression,
        arguments: &[Expression],
        span: Span,
    ) -> Result<Option<BasicValueEnum<'ctx>>> {
        match &callee.kind {
            ExpressionKind::Identifier(name) if name == "print" => {
                self.lower_print_call(arguments, span)?;
                Ok(None)
            }
            ExpressionKind::Identifier(name) => {
                let function = self.module.get_function(name).ok_or_else(|| {
                    CodegenError::UndefinedFunction {
                        name: name.clone(),
                        span: callee.span,
                    }
                })?;

                let args = self.lower_call_arguments(function, 0, arguments)?;
                let call = self.builder.build_call(function, &args, "call")?;
                Ok(call.try_as_basic_value().left())
            }
            // Method call: `p.m(...)` becomes `Type.m(&p, ...fields..., ...)`
            ExpressionKind::Member { object, property } => {
                let ExpressionKind::Identifier(object_name) = &object.kind else {
                    return Err(CodegenError::UnsupportedCallee { span: callee.span });
                };
                let entry = self
                    .symbols
                    .get(object_name)
                    .ok_or_else(|| CodegenError::UndefinedSymbol {
                        name: object_name.clone(),
                        span: object.span,
                    })?
                    .clone();
                let type_name =
                    entry
                        .type_name
                        .clone()
                        .ok_or_else(|| CodegenError::NotAStruct {
                            name: object_name.clone(),
                            span: object.span,
                        })?;
                let info = self
                    .structs
                    .get(&type_name)
                    .ok_or_else(|| CodegenError::UnknownType {
                        name: type_name.clone(),
                        span: object.span,
                    })?
                    .clone();

                let mangled = format!("{type_name}.{property}");
                let function = self.module.get_function(&mangled).ok_or_else(|| {
                    CodegenError::UndefinedFunction {
                        name: mangled.clone(),
                        span,
                    }
                })?;

                let self_ptr = entry.ptr.expect("struct variables have storage");
                let mut args: Vec<BasicMetadataValueEnum> = vec![self_ptr.into()];
                for (i, (field_name, field_type)) in info.fields.iter().enumerate() {
                    let field_ptr = self.builder.build_struct_gep(
                        self_ptr,
                        i as u32,
                        &format!("{field_name}_ptr"),
                    )?;
                    let field = self
                        .builder
                        .build_load(field_ptr, field_name)?;
                    args.push(field.into());
                }

                let explicit = self.lower_call_arguments(
                    function,
                    info.fields.len() as u32 + 1,
                    arguments,
                )?;
                args.extend(explicit);

                let call = self.builder.build_call(function, &args, "call")?;
                Ok(call.try_as_basic_value().left())
            }
            _ => Err(CodegenError::UnsupportedCallee { span: callee.span }),
        }
    }

    /// Lower arguments in order, sign-extending narrower integers to the
    /// declared parameter types starting at parameter index `offset`
    fn lower_call_arguments(
        &mut self,
        function: FunctionValue<'ctx>,
        offset: u32,
        arguments: &[Expression],
    ) -> Result<Vec<BasicMetadataValueEnum<'ctx>>> {
        let param_types = function.get_type().get_param_types();

        let mut args = Vec::with_capacity(arguments.len());
        for (i, argument) in arguments.iter().enumerate() {
            let mut value = self.lower_to_value(argument)?;
            if let Some(expected) = param_types.get(offset as usize + i) {
                if let Ok(expected) = BasicTypeEnum::try_from(*expected) {
                    value = self.widen_to(value, expected)?;
                }
            }
            args.push(value.into());
        }
        Ok(args)
    }

    /// The `print` builtin picks `%d` or `%s` from the operand's type
    fn lower_print_call(&mut self, arguments: &[Expression], span: Span) -> Result<()> {
        let [argument] = arguments else {
            return Err(CodegenError::PrintArity { span });
        };
        let value = self.lower_to_value(argument)?;

        let (format, final_arg): (&str, BasicMetadataValueEnum) = match value {
            BasicValueEnum::IntValue(int) => {
                let promoted = if int.get_type().get_bit_width() < 32 {
                    self.builder
                        .build_int_s_extend(int, self.context.i32_type(), "print_promote")?
                } else {
                    int
                };
                ("%d\n", promoted.into())
            }
            BasicValueEnum::PointerValue(ptr) => ("%s\n", ptr.into()),
            _ => return Err(CodegenError::UnsupportedPrintArgument { span: argument.span }),
        };

        let format_name = if format == "%d\n" { "fmt_int" } else { "fmt_str" };
        let format_ptr = self
            .builder
            .build_global_string_ptr(format, format_name)?
            .as_pointer_value();

        self.builder
            .build_call(self.printf, &[format_ptr.into(), final_arg], "printf_call")?;
        Ok(())
    }

    /// Stack-allocate `[n x E]` and store each element through GEP `[0, i]`
    pub(crate) fn lower_array_literal(
        &mut self,
        elements: &[Expression],
        span: Span,
    ) -> Result<(PointerValue<'ctx>, ArrayType<'ctx>)> {
        self.require_block(span)?;

        let values = elements
            .iter()
            .map(|element| self.lower_to_value(element))
            .collect::<Result<Vec<_>>>()?;

        let element_type = values
            .first()
            .map(|value| value.get_type())
            .unwrap_or_else(|| self.context.i32_type().into());
        let array_type = array_type_of(element_type, values.len() as u32);

        let array_ptr = self.builder.build_alloca(array_type, "array_literal")?;

        let i32_type = self.context.i32_type();
        for (i, value) in values.into_iter().enumerate() {
            let indices = [
                i32_type.const_zero(),
                i32_type.const_int(i as u64, false),
            ];
            let element_ptr = unsafe {
                self.builder.build_in_bounds_gep(
                    array_type,
                    array_ptr,
                    &indices,
                    &format!("element_{i}_ptr"),
                )?
            };
            self.builder.build_store(element_ptr, value)?;
        }

        Ok((array_ptr, array_type))
    }

    /// GEP to `name[index]`; the symbol must carry an array type
    fn lower_element_ptr(
        &mut self,
        name: &str,
        index: &Expression,
        span: Span,
    ) -> Result<(PointerValue<'ctx>, BasicTypeEnum<'ctx>)> {
        let entry = self
            .symbols
            .get(name)
            .ok_or_else(|| CodegenError::UndefinedSymbol {
                name: name.to_string(),
                span,
            })?
            .clone();
        let array_type = entry.array_type.ok_or_else(|| CodegenError::NotAnArray {
            name: name.to_string(),
            span,
        })?;

        let slot = entry.ptr.expect("array symbols have storage");
        let array_ptr = self
            .builder
            .build_load(entry.ty, slot, name)?
            .into_pointer_value();

        let index_value = self.lower_to_value(index)?;
        let index_value = self.expect_int(index_value, index.span)?;

        let indices = [self.context.i32_type().const_zero(), index_value];
        let element_ptr = unsafe {
            self.builder
                .build_in_bounds_gep(array_type, array_ptr, &indices, "element_ptr")?
        };
        Ok((element_ptr, array_type.get_element_type()))
    }

    fn lower_member(
        &mut self,
        object: &Expression,
        property: &str,
        span: Span,
    ) -> Result<BasicValueEnum<'ctx>> {
        let ExpressionKind::Identifier(name) = &object.kind else {
            return Err(CodegenError::UnsupportedMemberTarget { span: object.span });
        };

        let entry = self
            .symbols
            .get(name)
            .ok_or_else(|| CodegenError::UndefinedSymbol {
                name: name.clone(),
                span: object.span,
            })?
            .clone();
        let type_name = entry
            .type_name
            .clone()
            .ok_or_else(|| CodegenError::NotAStruct {
                name: name.clone(),
                span: object.span,
            })?;
        let info = self
            .structs
            .get(&type_name)
            .ok_or_else(|| CodegenError::UnknownType {
                name: type_name.clone(),
                span: object.span,
            })?
            .clone();

        let index = *info
            .indices
            .get(property)
            .ok_or_else(|| CodegenError::UnknownField {
                type_name: type_name.clone(),
                field: property.to_string(),
                span,
            })?;

        let struct_ptr = entry.ptr.expect("struct variables have storage");
        let field_ptr = self.builder.build_struct_gep(
            info.ty,
            struct_ptr,
            index,
            &format!("{property}_ptr"),
        )?;
        let field_type = info.fields[index as usize].1;
        Ok(self.builder.build_load(field_type, field_ptr, property)?)
    }

    /// Allocate an instance, call `Type.constructor` with the literal's
    /// values rearranged into constructor-parameter order, and load the
    /// resulting struct value
    fn lower_composite_literal(
        &mut self,
        type_name: &str,
        fields: &[(String, Expression)],
        span: Span,
    ) -> Result<BasicValueEnum<'ctx>> {
        self.require_block(span)?;

        let info = self
            .structs
            .get(type_name)
            .ok_or_else(|| CodegenError::UnknownType {
                name: type_name.to_string(),
                span,
            })?
            .clone();

        let mangled = format!("{type_name}.constructor");
        let constructor =
            self.module
                .get_function(&mangled)
                .ok_or_else(|| CodegenError::UndefinedFunction {
                    name: mangled,
                    span,
                })?;

        // Key → expression map; source order is irrelevant from here on
        let mut provided: std::collections::HashMap<&str, &Expression> = fields
            .iter()
            .map(|(key, value)| (key.as_str(), value))
            .collect();

        for (key, _) in fields {
            if !info.indices.contains_key(key) {
                return Err(CodegenError::UnknownField {
                    type_name: type_name.to_string(),
                    field: key.clone(),
                    span,
                });
            }
        }

        let instance = self.builder.build_alloca(info.ty, "instance")?;

        let mut args: Vec<BasicMetadataValueEnum> = vec![instance.into()];
        for (field_name, field_type) in &info.fields {
            let expr =
                provided
                    .remove(field_name.as_str())
                    .ok_or_else(|| CodegenError::MissingField {
                        type_name: type_name.to_string(),
                        field: field_name.clone(),
                        span,
                    })?;
            let value = self.lower_to_value(expr)?;
            let value = self.widen_to(value, *field_type)?;
            args.push(value.into());
        }

        self.builder.build_call(constructor, &args, "")?;
        Ok(self.builder.build_load(info.ty, instance, "instance_val")?)
    }

    /// A call whose result we always need
    fn call_returning(
        &mut self,
        function: FunctionValue<'ctx>,
        args: &[BasicMetadataValueEnum<'ctx>],
        name: &str,
    ) -> Result<BasicValueEnum<'ctx>> {
        let call = self.builder.build_call(function, args, name)?;
        Ok(call
            .try_as_basic_value()
            .left()
            .expect("libc helpers return values"))
    }
}

fn array_type_of(element_type: BasicTypeEnum<'_>, len: u32) -> ArrayType<'_> {
    use inkwell::types::BasicType;
    element_type.array_type(len)
}
