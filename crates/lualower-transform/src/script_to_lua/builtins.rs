/*! Dispatch boundary for standard-library references.
 *
 * The front-end's checker classifies identifiers and property-access owners;
 * recognized sites route to a direct Lua mapping or a runtime feature request.
 * Everything unrecognized returns `None` and lowers generically.
 */

use super::context::LoweringContext;
use super::lualib::feature_identifier;
use lualower_ast::{NodeId, StandardLibraryKind};
use lualower_core::{BinaryOperator, Expression};
use lualower_runtime::LuaLibFeature;

/// Lowers a bare identifier the checker classified as standard library.
pub fn lower_builtin_identifier(
    context: &mut LoweringContext,
    node: NodeId,
) -> Option<Expression> {
    let kind = context.resolver.standard_library_kind(node)?;
    match kind {
        StandardLibraryKind::Math => Some(Expression::name("math")),
        StandardLibraryKind::NaN => Some(Expression::binary(
            BinaryOperator::Div,
            Expression::number(0.0),
            Expression::number(0.0),
        )),
        StandardLibraryKind::Infinity => Some(Expression::property(Expression::name("math"), "huge")),
        StandardLibraryKind::GlobalThis => Some(Expression::name("_G")),
        StandardLibraryKind::PromiseConstructor => {
            context.import_feature(LuaLibFeature::Promise);
            Some(feature_identifier(LuaLibFeature::Promise))
        }
        StandardLibraryKind::SymbolConstructor => {
            context.import_feature(LuaLibFeature::Symbol);
            Some(feature_identifier(LuaLibFeature::Symbol))
        }
        StandardLibraryKind::ObjectConstructor => None,
    }
}

/// Lowers `owner.property` where the owner is standard library. Covers
/// `Math.*` direct mappings, `Promise.resolve`/`Promise.reject`, and
/// `Object.assign`.
pub fn lower_builtin_property_access(
    context: &mut LoweringContext,
    owner: NodeId,
    property: &str,
) -> Option<Expression> {
    let kind = context.resolver.standard_library_kind(owner)?;
    match kind {
        StandardLibraryKind::Math => Some(Expression::property(Expression::name("math"), property)),
        StandardLibraryKind::PromiseConstructor if property == "resolve" || property == "reject" => {
            context.import_feature(LuaLibFeature::Promise);
            Some(Expression::property(
                feature_identifier(LuaLibFeature::Promise),
                property,
            ))
        }
        StandardLibraryKind::ObjectConstructor if property == "assign" => {
            context.import_feature(LuaLibFeature::ObjectAssign);
            Some(feature_identifier(LuaLibFeature::ObjectAssign))
        }
        _ => None,
    }
}
