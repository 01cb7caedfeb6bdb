//! 表达式引擎 - 对数据上下文求值 $exp 源文本
//!
//! 支持的语法是仪表盘 DSL 实际用到的子集：
//! 属性路径、下标、方法尾调用、三元、比较、逻辑、加减乘除、字符串拼接。
//! 不引入脚本运行时，所有求值都是对上下文的只读推导。

use serde_json::{Number, Value as JsonValue};
use thiserror::Error;

/// 表达式求值错误（渲染器会补上节点 id 和源文本）
#[derive(Debug, Error)]
#[error("{0}")]
pub struct EvalError(pub String);

pub type EvalResult = Result<JsonValue, EvalError>;

fn err<T>(msg: impl Into<String>) -> Result<T, EvalError> {
    Err(EvalError(msg.into()))
}

/// 对上下文求值一个表达式
///
/// 上下文的每个顶层 key 都作为自由变量暴露，表达式里直接写
/// `dashboardStats.users`，不带任何前缀。未定义的名字是错误。
pub fn evaluate(source: &str, context: &JsonValue) -> EvalResult {
    let expr = source.trim();
    if expr.is_empty() {
        return err("empty expression");
    }

    // 三元表达式：cond ? a : b（b 分支可继续链式三元）
    if let Some(q) = find_top_level(expr, "?") {
        if let Some(c) = find_ternary_colon(&expr[q + 1..]) {
            let cond = &expr[..q];
            let true_val = &expr[q + 1..q + 1 + c];
            let false_val = &expr[q + 1 + c + 1..];
            return if is_truthy(&evaluate(cond, context)?) {
                evaluate(true_val, context)
            } else {
                evaluate(false_val, context)
            };
        }
    }

    // 逻辑或/与：返回操作数本身，不强转布尔
    if let Some(pos) = find_top_level(expr, "||") {
        let left = evaluate(&expr[..pos], context)?;
        return if is_truthy(&left) {
            Ok(left)
        } else {
            evaluate(&expr[pos + 2..], context)
        };
    }
    if let Some(pos) = find_top_level(expr, "&&") {
        let left = evaluate(&expr[..pos], context)?;
        return if is_truthy(&left) {
            evaluate(&expr[pos + 2..], context)
        } else {
            Ok(left)
        };
    }

    // 比较运算：长操作符优先，避免 `>=` 被当成 `>`
    for op in ["===", "!==", "==", "!=", ">=", "<=", ">", "<"] {
        if let Some(pos) = find_top_level(expr, op) {
            let left = evaluate(&expr[..pos], context)?;
            let right = evaluate(&expr[pos + op.len()..], context)?;
            let result = match op {
                "===" => strict_eq(&left, &right),
                "!==" => !strict_eq(&left, &right),
                "==" => loose_eq(&left, &right),
                "!=" => !loose_eq(&left, &right),
                // 关系比较：任一侧转不成数值时结果为 false（对应 JS 的 NaN 比较）
                _ => match (as_comparable(&left), as_comparable(&right)) {
                    (Some(l), Some(r)) => match op {
                        ">" => l > r,
                        "<" => l < r,
                        ">=" => l >= r,
                        "<=" => l <= r,
                        _ => unreachable!(),
                    },
                    _ => false,
                },
            };
            return Ok(JsonValue::Bool(result));
        }
    }

    // 加减：取最右侧顶层操作符保持左结合
    if let Some((pos, op)) = find_last_additive(expr) {
        let left = evaluate(&expr[..pos], context)?;
        let right = evaluate(&expr[pos + 1..], context)?;
        return match op {
            '+' => add_values(&left, &right),
            _ => Ok(number_value(as_number(&left) - as_number(&right))),
        };
    }
    if let Some((pos, op)) = find_last_top_level_of(expr, &['*', '/']) {
        let left = as_number(&evaluate(&expr[..pos], context)?);
        let right = as_number(&evaluate(&expr[pos + 1..], context)?);
        return match op {
            '*' => Ok(number_value(left * right)),
            _ if right == 0.0 => err(format!("division by zero in `{expr}`")),
            _ => Ok(number_value(left / right)),
        };
    }

    // 一元
    if let Some(rest) = expr.strip_prefix('!') {
        return Ok(JsonValue::Bool(!is_truthy(&evaluate(rest, context)?)));
    }
    if let Some(rest) = expr.strip_prefix('-') {
        return Ok(number_value(-as_number(&evaluate(rest, context)?)));
    }

    // 括号
    if expr.starts_with('(') && matching_paren(expr) == Some(expr.len() - 1) {
        return evaluate(&expr[1..expr.len() - 1], context);
    }

    // 字面量
    if (expr.starts_with('\'') && expr.ends_with('\'') && expr.len() >= 2)
        || (expr.starts_with('"') && expr.ends_with('"') && expr.len() >= 2)
    {
        return Ok(JsonValue::String(expr[1..expr.len() - 1].to_string()));
    }
    if let Ok(n) = expr.parse::<i64>() {
        return Ok(JsonValue::Number(n.into()));
    }
    if let Ok(n) = expr.parse::<f64>() {
        return Ok(number_value(n));
    }
    match expr {
        "true" => return Ok(JsonValue::Bool(true)),
        "false" => return Ok(JsonValue::Bool(false)),
        "null" | "undefined" => return Ok(JsonValue::Null),
        _ => {}
    }

    // 属性路径 + 方法尾调用
    evaluate_path(expr, context)
}

/// 条件求值：按 JS 的宽松真值规则
pub fn evaluate_condition(source: &str, context: &JsonValue) -> Result<bool, EvalError> {
    Ok(is_truthy(&evaluate(source, context)?))
}

/// 解析 `$bind` 的点路径（不走表达式语法）
pub fn resolve_path(path: &str, context: &JsonValue) -> EvalResult {
    let path = path.trim();
    if path.is_empty() {
        return err("empty binding path");
    }
    let mut current = context;
    for part in path.split('.') {
        current = step_into(current, part)
            .ok_or_else(|| EvalError(format!("undefined reference `{part}` in `{path}`")))?;
    }
    Ok(current.clone())
}

/// 插值替换：把字符串里的 `{{expr}}` 和 `${expr}` 段替换为求值结果
pub fn interpolate(template: &str, context: &JsonValue) -> Result<String, EvalError> {
    if !template.contains("{{") && !template.contains("${") {
        return Ok(template.to_string());
    }
    let mut result = String::with_capacity(template.len());
    let mut rest = template;
    loop {
        let open_curly = rest.find("{{");
        let open_dollar = rest.find("${");
        let (open, marker_len, close_marker) = match (open_curly, open_dollar) {
            (Some(c), Some(d)) if c <= d => (c, 2, "}}"),
            (Some(c), None) => (c, 2, "}}"),
            (_, Some(d)) => (d, 2, "}"),
            (None, None) => {
                result.push_str(rest);
                return Ok(result);
            }
        };
        result.push_str(&rest[..open]);
        let body = &rest[open + marker_len..];
        match body.find(close_marker) {
            Some(close) => {
                let value = evaluate(&body[..close], context)?;
                result.push_str(&to_display_string(&value));
                rest = &body[close + close_marker.len()..];
            }
            None => {
                // 没有闭合标记，剩余部分按字面量处理
                result.push_str(&rest[open..]);
                return Ok(result);
            }
        }
    }
}

/// JS 风格真值判断
pub fn is_truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => false,
        JsonValue::Bool(b) => *b,
        JsonValue::Number(n) => n.as_f64().unwrap_or(0.0) != 0.0,
        JsonValue::String(s) => !s.is_empty(),
        JsonValue::Array(_) => true,
        JsonValue::Object(_) => true,
    }
}

/// 值转显示字符串（用于文本子节点和插值）
pub fn to_display_string(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Number(n) => format_number(n),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Null => String::new(),
        _ => value.to_string(),
    }
}

// ---------- 路径与方法 ----------

fn evaluate_path(expr: &str, context: &JsonValue) -> EvalResult {
    let segments = split_top_level(expr, '.');
    if segments.is_empty() {
        return err(format!("cannot parse expression `{expr}`"));
    }

    let first = segments[0].trim();
    let mut current = match lookup_segment(context, first) {
        Some(v) => v.clone(),
        None => return err(format!("undefined reference `{first}`")),
    };

    for seg in &segments[1..] {
        let seg = seg.trim();
        if let Some(call) = parse_call(seg) {
            current = apply_method(&current, call.0, call.1, context, expr)?;
        } else {
            current = match lookup_segment(&current, seg) {
                Some(v) => v.clone(),
                None if seg == "length" => length_of(&current, expr)?,
                None => return err(format!("undefined property `{seg}` in `{expr}`")),
            };
        }
    }
    Ok(current)
}

/// 解析一段路径：`name`、`name[0]`、`name["key"]`
fn lookup_segment<'a>(value: &'a JsonValue, segment: &str) -> Option<&'a JsonValue> {
    let mut current = value;
    let mut rest = segment;
    if let Some(bracket) = rest.find('[') {
        let name = &rest[..bracket];
        if !name.is_empty() {
            current = current.get(name)?;
        }
        rest = &rest[bracket..];
        while let Some(stripped) = rest.strip_prefix('[') {
            let close = stripped.find(']')?;
            let index = stripped[..close].trim();
            if let Ok(i) = index.parse::<usize>() {
                current = current.get(i)?;
            } else {
                let key = index.trim_matches(|c| c == '\'' || c == '"');
                current = current.get(key)?;
            }
            rest = &stripped[close + 1..];
        }
        Some(current)
    } else {
        step_into(current, segment)
    }
}

fn step_into<'a>(value: &'a JsonValue, part: &str) -> Option<&'a JsonValue> {
    if let Ok(i) = part.parse::<usize>() {
        if value.is_array() {
            return value.get(i);
        }
    }
    value.get(part)
}

/// 识别方法调用段 `name(args)`
fn parse_call(segment: &str) -> Option<(&str, &str)> {
    let open = segment.find('(')?;
    if !segment.ends_with(')') {
        return None;
    }
    let name = &segment[..open];
    if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return None;
    }
    Some((name, &segment[open + 1..segment.len() - 1]))
}

/// 受支持的方法尾调用集合
fn apply_method(
    receiver: &JsonValue,
    method: &str,
    args: &str,
    context: &JsonValue,
    expr: &str,
) -> EvalResult {
    match method {
        "toLocaleString" => match receiver {
            JsonValue::Number(n) => Ok(JsonValue::String(format_locale(
                n.as_f64().unwrap_or(0.0),
            ))),
            JsonValue::String(s) => Ok(JsonValue::String(s.clone())),
            _ => err(format!("toLocaleString on non-number in `{expr}`")),
        },
        "toFixed" => {
            let digits = if args.trim().is_empty() {
                0
            } else {
                as_number(&evaluate(args, context)?) as usize
            };
            match receiver {
                JsonValue::Number(n) => Ok(JsonValue::String(format!(
                    "{:.*}",
                    digits.min(20),
                    n.as_f64().unwrap_or(0.0)
                ))),
                _ => err(format!("toFixed on non-number in `{expr}`")),
            }
        }
        "toUpperCase" => match receiver {
            JsonValue::String(s) => Ok(JsonValue::String(s.to_uppercase())),
            _ => err(format!("toUpperCase on non-string in `{expr}`")),
        },
        "toLowerCase" => match receiver {
            JsonValue::String(s) => Ok(JsonValue::String(s.to_lowercase())),
            _ => err(format!("toLowerCase on non-string in `{expr}`")),
        },
        "join" => {
            let sep = if args.trim().is_empty() {
                ",".to_string()
            } else {
                to_display_string(&evaluate(args, context)?)
            };
            match receiver {
                JsonValue::Array(items) => Ok(JsonValue::String(
                    items
                        .iter()
                        .map(to_display_string)
                        .collect::<Vec<_>>()
                        .join(&sep),
                )),
                _ => err(format!("join on non-array in `{expr}`")),
            }
        }
        other => err(format!("unsupported method `{other}` in `{expr}`")),
    }
}

fn length_of(value: &JsonValue, expr: &str) -> EvalResult {
    match value {
        JsonValue::String(s) => Ok(JsonValue::Number(Number::from(s.chars().count()))),
        JsonValue::Array(a) => Ok(JsonValue::Number(Number::from(a.len()))),
        _ => err(format!("length of non-string/array in `{expr}`")),
    }
}

// ---------- 数值与相等 ----------

/// 宽松数值转换（JS 风格：无法转换按 0 处理）
fn as_number(value: &JsonValue) -> f64 {
    match value {
        JsonValue::Number(n) => n.as_f64().unwrap_or(0.0),
        JsonValue::String(s) => s.trim().parse().unwrap_or(0.0),
        JsonValue::Bool(true) => 1.0,
        _ => 0.0,
    }
}

/// 关系比较用的数值转换：JS 里会变成 NaN 的值返回 None
fn as_comparable(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Some(0.0)
            } else {
                trimmed.parse().ok()
            }
        }
        JsonValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        JsonValue::Null => Some(0.0),
        _ => None,
    }
}

/// 严格相等：类型不同直接为 false，不做任何转换
fn strict_eq(a: &JsonValue, b: &JsonValue) -> bool {
    match (a, b) {
        // 整数和浮点表示同一个数时按数值比较
        (JsonValue::Number(x), JsonValue::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn loose_eq(a: &JsonValue, b: &JsonValue) -> bool {
    if a == b {
        return true;
    }
    match (a, b) {
        (JsonValue::Number(_), _) | (_, JsonValue::Number(_)) => {
            to_display_string(a) == to_display_string(b) || as_number(a) == as_number(b)
        }
        _ => to_display_string(a) == to_display_string(b),
    }
}

fn number_value(n: f64) -> JsonValue {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        JsonValue::Number(Number::from(n as i64))
    } else {
        Number::from_f64(n)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null)
    }
}

fn add_values(left: &JsonValue, right: &JsonValue) -> EvalResult {
    match (left, right) {
        (JsonValue::String(_), _) | (_, JsonValue::String(_)) => Ok(JsonValue::String(
            format!("{}{}", to_display_string(left), to_display_string(right)),
        )),
        (JsonValue::Array(_) | JsonValue::Object(_), _)
        | (_, JsonValue::Array(_) | JsonValue::Object(_)) => {
            err("cannot add arrays or objects")
        }
        _ => Ok(number_value(as_number(left) + as_number(right))),
    }
}

/// 整数部分千分位分组，小数最多保留 3 位（en-US 默认）
fn format_locale(n: f64) -> String {
    let negative = n < 0.0;
    let rounded = (n.abs() * 1000.0).round() / 1000.0;
    let int_part = rounded.trunc() as u64;
    let frac = rounded - rounded.trunc();

    let digits = int_part.to_string();
    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push_str(&grouped);
    if frac > 0.0 {
        let frac_str = format!("{frac:.3}");
        let trimmed = frac_str.trim_start_matches("0.").trim_end_matches('0');
        if !trimmed.is_empty() {
            out.push('.');
            out.push_str(trimmed);
        }
    }
    out
}

fn format_number(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    let f = n.as_f64().unwrap_or(0.0);
    if f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        f.to_string()
    }
}

// ---------- 顶层扫描（跳过引号和括号嵌套） ----------

/// 在引号外、括号嵌套深度为 0 的位置查找操作符
fn find_top_level(s: &str, needle: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut depth = 0i32;
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
        } else {
            match c {
                b'\'' | b'"' => quote = Some(c),
                b'(' | b'[' => depth += 1,
                b')' | b']' => depth -= 1,
                _ => {
                    // 非 ASCII 字节只会出现在引号内的文本里，跳过以保证切片边界安全
                    if depth == 0 && c.is_ascii() && s[i..].starts_with(needle) {
                        return Some(i);
                    }
                }
            }
        }
        i += 1;
    }
    None
}

/// 定位三元表达式的冒号：跳过真值分支里嵌套的 `? :`
fn find_ternary_colon(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut depth = 0i32;
    let mut ternary = 0i32;
    let mut quote: Option<u8> = None;
    for (i, &c) in bytes.iter().enumerate() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            b'\'' | b'"' => quote = Some(c),
            b'(' | b'[' => depth += 1,
            b')' | b']' => depth -= 1,
            b'?' if depth == 0 => ternary += 1,
            b':' if depth == 0 => {
                if ternary == 0 {
                    return Some(i);
                }
                ternary -= 1;
            }
            _ => {}
        }
    }
    None
}

/// 最右侧的顶层二元 `+`/`-`（跳过一元正负号）
fn find_last_additive(s: &str) -> Option<(usize, char)> {
    find_last_binary(s, &['+', '-'])
}

fn find_last_top_level_of(s: &str, ops: &[char]) -> Option<(usize, char)> {
    find_last_binary(s, ops)
}

fn find_last_binary(s: &str, ops: &[char]) -> Option<(usize, char)> {
    let bytes = s.as_bytes();
    let mut depth = 0i32;
    let mut quote: Option<u8> = None;
    let mut found = None;
    for (i, &c) in bytes.iter().enumerate() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            b'\'' | b'"' => quote = Some(c),
            b'(' | b'[' => depth += 1,
            b')' | b']' => depth -= 1,
            _ if depth == 0 && ops.contains(&(c as char)) => {
                if is_binary_position(s, i) {
                    found = Some((i, c as char));
                }
            }
            _ => {}
        }
    }
    found
}

/// 操作符左侧必须是值的结尾，否则视为一元符号或科学计数法的一部分
fn is_binary_position(s: &str, pos: usize) -> bool {
    let prev = s[..pos].trim_end().chars().last();
    match prev {
        None => false,
        Some(c) if "+-*/%<>=&|!(,?:".contains(c) => false,
        // 1e-5 / 2E+3
        Some('e') | Some('E') => {
            let before: Vec<char> = s[..pos].trim_end().chars().collect();
            !(before.len() >= 2 && before[before.len() - 2].is_ascii_digit())
        }
        _ => true,
    }
}

/// 按顶层分隔符切分（方法参数里的 `.` 不会切断路径）
fn split_top_level(s: &str, sep: char) -> Vec<&str> {
    let bytes = s.as_bytes();
    let mut depth = 0i32;
    let mut quote: Option<u8> = None;
    let mut parts = Vec::new();
    let mut start = 0;
    for (i, &c) in bytes.iter().enumerate() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            b'\'' | b'"' => quote = Some(c),
            b'(' | b'[' => depth += 1,
            b')' | b']' => depth -= 1,
            _ if depth == 0 && c as char == sep => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

fn matching_paren(s: &str) -> Option<usize> {
    let mut depth = 0i32;
    let mut quote: Option<u8> = None;
    for (i, &c) in s.as_bytes().iter().enumerate() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            b'\'' | b'"' => quote = Some(c),
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}
