use super::context::LoweringContext;
use lualower_core::Expression;
use lualower_runtime::LuaLibFeature;

/// Emitted name of the feature's primary binding.
pub fn feature_identifier(feature: LuaLibFeature) -> Expression {
    Expression::name(format!("__LL_{}", feature.name()))
}

/// Requests `feature` and calls its primary binding.
pub fn lua_lib_call(
    context: &mut LoweringContext,
    feature: LuaLibFeature,
    args: Vec<Expression>,
) -> Expression {
    context.import_feature(feature);
    Expression::call(feature_identifier(feature), args)
}

/// Requests `feature` and calls one of its secondary bindings, for chunks that
/// define more than one helper.
pub fn lua_lib_binding_call(
    context: &mut LoweringContext,
    feature: LuaLibFeature,
    binding: &str,
    args: Vec<Expression>,
) -> Expression {
    context.import_feature(feature);
    Expression::call(Expression::name(binding), args)
}
