use std::fmt;

/// Runtime support modules the lowering engine requests by name. Each
/// feature's fixed Lua source is bundled at most once per compilation unit,
/// dependencies first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LuaLibFeature {
    ArraySlice,
    AsyncAwaiter,
    Await,
    Class,
    Descriptors,
    ObjectAssign,
    ObjectRest,
    Promise,
    Spread,
    Symbol,
    Unpack,
}

impl LuaLibFeature {
    pub fn name(self) -> &'static str {
        match self {
            LuaLibFeature::ArraySlice => "ArraySlice",
            LuaLibFeature::AsyncAwaiter => "AsyncAwaiter",
            LuaLibFeature::Await => "Await",
            LuaLibFeature::Class => "Class",
            LuaLibFeature::Descriptors => "Descriptors",
            LuaLibFeature::ObjectAssign => "ObjectAssign",
            LuaLibFeature::ObjectRest => "ObjectRest",
            LuaLibFeature::Promise => "Promise",
            LuaLibFeature::Spread => "Spread",
            LuaLibFeature::Symbol => "Symbol",
            LuaLibFeature::Unpack => "Unpack",
        }
    }

    /// Features whose chunks must appear before this one in the bundle.
    pub fn dependencies(self) -> &'static [LuaLibFeature] {
        match self {
            LuaLibFeature::AsyncAwaiter => &[LuaLibFeature::Promise, LuaLibFeature::Await],
            LuaLibFeature::Spread => &[LuaLibFeature::Unpack],
            _ => &[],
        }
    }

    pub fn source(self) -> &'static str {
        match self {
            LuaLibFeature::ArraySlice => ARRAY_SLICE_SOURCE,
            LuaLibFeature::AsyncAwaiter => ASYNC_AWAITER_SOURCE,
            LuaLibFeature::Await => AWAIT_SOURCE,
            LuaLibFeature::Class => CLASS_SOURCE,
            LuaLibFeature::Descriptors => DESCRIPTORS_SOURCE,
            LuaLibFeature::ObjectAssign => OBJECT_ASSIGN_SOURCE,
            LuaLibFeature::ObjectRest => OBJECT_REST_SOURCE,
            LuaLibFeature::Promise => PROMISE_SOURCE,
            LuaLibFeature::Spread => SPREAD_SOURCE,
            LuaLibFeature::Symbol => SYMBOL_SOURCE,
            LuaLibFeature::Unpack => UNPACK_SOURCE,
        }
    }
}

impl fmt::Display for LuaLibFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Orders `features` with dependencies ahead of dependents, keeping first
/// occurrences and dropping duplicates.
pub fn resolve_feature_order(features: &[LuaLibFeature]) -> Vec<LuaLibFeature> {
    let mut ordered = Vec::new();
    for &feature in features {
        push_with_dependencies(feature, &mut ordered);
    }
    ordered
}

fn push_with_dependencies(feature: LuaLibFeature, ordered: &mut Vec<LuaLibFeature>) {
    if ordered.contains(&feature) {
        return;
    }
    for &dependency in feature.dependencies() {
        push_with_dependencies(dependency, ordered);
    }
    ordered.push(feature);
}

/// Concatenated Lua source for `features` in dependency order. The chunks
/// declare file-local bindings, so the bundle is prepended to the lowered
/// output as one chunk.
pub fn bundle(features: &[LuaLibFeature]) -> String {
    let mut output = String::new();
    for feature in resolve_feature_order(features) {
        output.push_str(feature.source());
        if !output.ends_with('\n') {
            output.push('\n');
        }
    }
    output
}

const UNPACK_SOURCE: &str = r#"local __LL_Unpack = table.unpack or unpack
"#;

const SPREAD_SOURCE: &str = r#"local function __LL_Spread(list)
    if type(list) == "string" then
        local characters = {}
        for i = 1, #list do
            characters[i] = string.sub(list, i, i)
        end
        return __LL_Unpack(characters)
    end
    return __LL_Unpack(list)
end
"#;

const OBJECT_ASSIGN_SOURCE: &str = r##"local function __LL_ObjectAssign(target, ...)
    for i = 1, select("#", ...) do
        local source = select(i, ...)
        if source ~= nil then
            for key, value in pairs(source) do
                target[key] = value
            end
        end
    end
    return target
end
"##;

const OBJECT_REST_SOURCE: &str = r#"local function __LL_ObjectRest(source, excluded)
    local result = {}
    for key, value in pairs(source) do
        if not excluded[key] then
            result[key] = value
        end
    end
    return result
end
"#;

const ARRAY_SLICE_SOURCE: &str = r#"local function __LL_ArraySlice(list, first)
    local result = {}
    for i = first + 1, #list do
        result[#result + 1] = list[i]
    end
    return result
end
"#;

const SYMBOL_SOURCE: &str = r#"local __LL_SymbolMetatable = {
    __tostring = function(self)
        return "Symbol(" .. (self.description or "") .. ")"
    end,
}

local function __LL_Symbol(description)
    return setmetatable({ description = description }, __LL_SymbolMetatable)
end
"#;

const CLASS_SOURCE: &str = r#"local function __LL_Class(name)
    local class = {}
    class.name = name
    class.prototype = {}
    class.prototype.__index = class.prototype
    class.prototype.constructor = class
    return class
end

local function __LL_ClassExtends(class, super)
    class.____super = super
    setmetatable(class, { __index = super })
    setmetatable(class.prototype, { __index = super.prototype })
end

local function __LL_New(class, ...)
    local instance = setmetatable({}, class.prototype)
    local constructor = class.prototype.____constructor
    if constructor then
        constructor(instance, ...)
    end
    return instance
end
"#;

const DESCRIPTORS_SOURCE: &str = r#"local function __LL_DescriptorIndex(self, key)
    local metatable = getmetatable(self)
    while metatable do
        local descriptors = rawget(metatable, "____descriptors")
        if descriptors then
            local descriptor = descriptors[key]
            if descriptor then
                if descriptor.get then
                    return descriptor.get(self)
                end
                return nil
            end
        end
        local value = rawget(metatable, key)
        if value ~= nil then
            return value
        end
        local index = rawget(metatable, "____index")
        if index ~= nil and index ~= metatable then
            local inherited = index[key]
            if inherited ~= nil then
                return inherited
            end
        end
        local parent = getmetatable(metatable)
        metatable = parent and rawget(parent, "__index")
        if type(metatable) ~= "table" then
            metatable = nil
        end
    end
    return nil
end

local function __LL_DescriptorNewIndex(self, key, value)
    local metatable = getmetatable(self)
    while metatable do
        local descriptors = rawget(metatable, "____descriptors")
        if descriptors then
            local descriptor = descriptors[key]
            if descriptor then
                if descriptor.set then
                    descriptor.set(self, value)
                end
                return
            end
        end
        local parent = getmetatable(metatable)
        metatable = parent and rawget(parent, "__index")
        if type(metatable) ~= "table" then
            metatable = nil
        end
    end
    rawset(self, key, value)
end

local function __LL_SetDescriptor(target, key, descriptor, static)
    local metatable
    if static then
        metatable = getmetatable(target)
        if metatable == nil then
            metatable = {}
            setmetatable(target, metatable)
        end
    else
        metatable = target
    end
    if rawget(metatable, "____descriptors") == nil then
        rawset(metatable, "____descriptors", {})
        local index = rawget(metatable, "__index")
        if type(index) == "table" and index ~= metatable then
            rawset(metatable, "____index", index)
        end
        rawset(metatable, "__index", __LL_DescriptorIndex)
        rawset(metatable, "__newindex", __LL_DescriptorNewIndex)
    end
    rawget(metatable, "____descriptors")[key] = descriptor
end
"#;

const PROMISE_SOURCE: &str = r#"local __LL_PromiseState = { Pending = 0, Fulfilled = 1, Rejected = 2 }

local __LL_Promise = {}
__LL_Promise.__index = __LL_Promise

local function __LL_IsPromise(value)
    return type(value) == "table" and getmetatable(value) == __LL_Promise
end

function __LL_Promise.new(executor)
    local self = setmetatable({
        state = __LL_PromiseState.Pending,
        value = nil,
        rejectionReason = nil,
        fulfilledCallbacks = {},
        rejectedCallbacks = {},
        finallyCallbacks = {},
    }, __LL_Promise)
    local ok, err = pcall(executor, function(data)
        self:_fulfill(data)
    end, function(reason)
        self:_reject(reason)
    end)
    if not ok then
        self:_reject(err)
    end
    return self
end

function __LL_Promise.resolve(data)
    local promise = __LL_Promise.new(function() end)
    promise.state = __LL_PromiseState.Fulfilled
    promise.value = data
    return promise
end

function __LL_Promise.reject(reason)
    local promise = __LL_Promise.new(function() end)
    promise.state = __LL_PromiseState.Rejected
    promise.rejectionReason = reason
    return promise
end

function __LL_Promise:_fulfill(data)
    if self.state == __LL_PromiseState.Pending then
        self.state = __LL_PromiseState.Fulfilled
        self.value = data
        for _, callback in ipairs(self.fulfilledCallbacks) do
            callback(data)
        end
        for _, callback in ipairs(self.finallyCallbacks) do
            callback()
        end
    end
end

function __LL_Promise:_reject(reason)
    if self.state == __LL_PromiseState.Pending then
        self.state = __LL_PromiseState.Rejected
        self.rejectionReason = reason
        for _, callback in ipairs(self.rejectedCallbacks) do
            callback(reason)
        end
        for _, callback in ipairs(self.finallyCallbacks) do
            callback()
        end
    end
end

local function __LL_PromiseAdopt(data, resolve, reject)
    if __LL_IsPromise(data) then
        if data.state == __LL_PromiseState.Fulfilled then
            resolve(data.value)
        elseif data.state == __LL_PromiseState.Rejected then
            reject(data.rejectionReason)
        else
            table.insert(data.fulfilledCallbacks, resolve)
            table.insert(data.rejectedCallbacks, reject)
        end
    else
        resolve(data)
    end
end

__LL_Promise["then"] = function(self, onFulfilled, onRejected)
    local child = __LL_Promise.new(function() end)
    local resolve = function(data)
        child:_fulfill(data)
    end
    local reject = function(reason)
        child:_reject(reason)
    end

    local fulfilledCallback
    if onFulfilled then
        fulfilledCallback = function(value)
            local ok, result = pcall(onFulfilled, value)
            if ok then
                __LL_PromiseAdopt(result, resolve, reject)
            else
                reject(result)
            end
        end
    else
        fulfilledCallback = resolve
    end
    if self.state == __LL_PromiseState.Fulfilled then
        fulfilledCallback(self.value)
    elseif self.state == __LL_PromiseState.Pending then
        table.insert(self.fulfilledCallbacks, fulfilledCallback)
    end

    local rejectedCallback
    if onRejected then
        rejectedCallback = function(reason)
            local ok, result = pcall(onRejected, reason)
            if ok then
                __LL_PromiseAdopt(result, resolve, reject)
            else
                reject(result)
            end
        end
    else
        rejectedCallback = reject
    end
    if self.state == __LL_PromiseState.Rejected then
        rejectedCallback(self.rejectionReason)
    elseif self.state == __LL_PromiseState.Pending then
        table.insert(self.rejectedCallbacks, rejectedCallback)
    end

    return child
end

function __LL_Promise:catch(onRejected)
    return self["then"](self, nil, onRejected)
end

function __LL_Promise:finally(onFinally)
    if onFinally then
        if self.state ~= __LL_PromiseState.Pending then
            onFinally()
        else
            table.insert(self.finallyCallbacks, onFinally)
        end
    end
    return self
end
"#;

const AWAIT_SOURCE: &str = r#"local __LL_AwaitMarker = {}

local function __LL_Await(thing)
    local resumed, reason = coroutine.yield(thing)
    if resumed == __LL_AwaitMarker then
        error(reason, 0)
    end
    return resumed
end
"#;

const ASYNC_AWAITER_SOURCE: &str = r#"local function __LL_AsyncAwaiter(body)
    return __LL_Promise.new(function(resolve, reject)
        local thread = coroutine.create(body)
        local fulfilled
        local rejected
        local step
        local function adopt(value)
            if __LL_IsPromise(value) then
                return value
            end
            return __LL_Promise.resolve(value)
        end
        fulfilled = function(value)
            local success, result = coroutine.resume(thread, value)
            if success then
                step(result)
            else
                reject(result)
            end
        end
        rejected = function(reason)
            local success, result = coroutine.resume(thread, __LL_AwaitMarker, reason)
            if success then
                step(result)
            else
                reject(result)
            end
        end
        step = function(result)
            if coroutine.status(thread) == "dead" then
                resolve(result)
            else
                local awaited = adopt(result)
                awaited["then"](awaited, fulfilled, rejected)
            end
        end
        local success, result = coroutine.resume(thread)
        if success then
            step(result)
        else
            reject(result)
        end
    end)
end
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn dependencies_precede_dependents() {
        let ordered = resolve_feature_order(&[LuaLibFeature::AsyncAwaiter]);
        assert_eq!(
            ordered,
            vec![
                LuaLibFeature::Promise,
                LuaLibFeature::Await,
                LuaLibFeature::AsyncAwaiter,
            ]
        );
    }

    #[test]
    fn duplicate_requests_bundle_once() {
        let ordered = resolve_feature_order(&[
            LuaLibFeature::Spread,
            LuaLibFeature::Unpack,
            LuaLibFeature::Spread,
        ]);
        assert_eq!(ordered, vec![LuaLibFeature::Unpack, LuaLibFeature::Spread]);
    }

    #[test]
    fn bundle_contains_each_requested_definition() {
        let output = bundle(&[LuaLibFeature::ObjectRest, LuaLibFeature::ArraySlice]);
        assert_eq!(output.matches("__LL_ObjectRest").count(), 1);
        assert_eq!(output.matches("local function __LL_ArraySlice").count(), 1);
    }

    #[test]
    fn every_feature_defines_its_own_binding() {
        for feature in [
            LuaLibFeature::ArraySlice,
            LuaLibFeature::AsyncAwaiter,
            LuaLibFeature::Await,
            LuaLibFeature::Class,
            LuaLibFeature::Descriptors,
            LuaLibFeature::ObjectAssign,
            LuaLibFeature::ObjectRest,
            LuaLibFeature::Promise,
            LuaLibFeature::Spread,
            LuaLibFeature::Symbol,
            LuaLibFeature::Unpack,
        ] {
            // The descriptor chunk's entry point is the setter helper.
            let binding = match feature {
                LuaLibFeature::Descriptors => "__LL_SetDescriptor".to_string(),
                _ => format!("__LL_{}", feature.name()),
            };
            assert!(
                feature.source().contains(&binding),
                "{feature} chunk does not define {binding}"
            );
        }
    }
}
