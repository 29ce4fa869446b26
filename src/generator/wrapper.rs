//! Flask wrapper emission
//!
//! The wrapper carries the endpoint table as literal data; it never inspects the user's
//! functions at runtime to decide how to bind a request.

use crate::discovery::{EndpointDescriptor, ParameterSpec};

/// Weave project the generated service reports to
pub const WEAVE_PROJECT: &str = "getmethatdawg";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrapperOptions {
    /// Reported by the health check
    pub service_name: String,
    /// Fallback when `PORT` is not set in the container
    pub port: u16,
    /// Initialise weave and trace endpoint calls
    pub observability: bool,
}

const TEMPLATE: &str = r#"#!/usr/bin/env python3
"""HTTP service generated by getmethatdawg. Do not edit by hand."""

import asyncio
import inspect
import json
import os
import sys

from flask import Flask, jsonify, request

sys.path.insert(0, os.path.dirname(os.path.abspath(__file__)))

import user_module

SERVICE_NAME = @SERVICE_NAME@

ENDPOINTS = [
@ENDPOINTS@]

app = Flask(__name__)
@OBSERVABILITY@

class RequestError(Exception):
    def __init__(self, message, parameter):
        super().__init__(message)
        self.parameter = parameter


def _coerce(value, expected):
    if expected == "int":
        if isinstance(value, bool):
            raise ValueError(value)
        if isinstance(value, float) and not value.is_integer():
            raise ValueError(value)
        return int(value)
    if expected == "float":
        if isinstance(value, bool):
            raise ValueError(value)
        return float(value)
    if expected == "bool":
        if isinstance(value, bool):
            return value
        text = str(value).strip().lower()
        if text in ("true", "1"):
            return True
        if text in ("false", "0"):
            return False
        raise ValueError(value)
    if expected in ("list", "dict"):
        parsed = json.loads(value) if isinstance(value, str) else value
        wanted = list if expected == "list" else dict
        if not isinstance(parsed, wanted):
            raise ValueError(value)
        return parsed
    if expected == "str":
        if isinstance(value, (list, dict)):
            raise ValueError(value)
        return value if isinstance(value, str) else str(value)
    return value


def _request_values(method):
    if method == "GET":
        return request.args
    if request.is_json:
        body = request.get_json(silent=True)
        return body if isinstance(body, dict) else {}
    return request.form


def _extract(endpoint):
    values = _request_values(endpoint["method"])
    kwargs = {}
    for param in endpoint["params"]:
        name = param["name"]
        value = values.get(name)
        if value is None:
            if param["required"]:
                raise RequestError(f"Missing required parameter: {name}", name)
            continue
        try:
            kwargs[name] = _coerce(value, param["type"])
        except (TypeError, ValueError):
            raise RequestError(
                f"Invalid type for parameter {name}: expected {param['type']}", name
            )
    return kwargs


def _make_handler(endpoint, function):
    def handler():
        try:
            kwargs = _extract(endpoint)
        except RequestError as exc:
            return jsonify({"error": str(exc), "parameter": exc.parameter}), 400
        try:
            result = function(**kwargs)
            if inspect.iscoroutine(result):
                result = asyncio.run(result)
            if isinstance(result, dict):
                return jsonify(result)
            return jsonify({"result": result})
        except Exception as exc:
            app.logger.exception("%s %s failed", endpoint["method"], endpoint["path"])
            return jsonify({"error": str(exc), "type": type(exc).__name__}), 500

    handler.__name__ = f"{endpoint['function']}_route"
    return handler


for _endpoint in ENDPOINTS:
    app.add_url_rule(
        _endpoint["path"],
        endpoint=f"{_endpoint['function']}_route",
        view_func=_make_handler(_endpoint, _observe(getattr(user_module, _endpoint["function"]))),
        methods=[_endpoint["method"]],
    )


@app.route("/", methods=["GET"])
def health_check():
    return jsonify({
        "status": "healthy",
        "service": SERVICE_NAME,
        "endpoint_count": len(ENDPOINTS),
        "endpoints": [{"method": e["method"], "path": e["path"]} for e in ENDPOINTS],
    })


if __name__ == "__main__":
    port = int(os.environ.get("PORT", @PORT@))
    app.run(host="0.0.0.0", port=port, debug=False)
"#;

const OBSERVABILITY_ENABLED: &str = r#"
try:
    import weave

    weave.init(@WEAVE_PROJECT@)
    print("Weave observability initialized", file=sys.stderr)

    def _observe(function):
        return weave.op()(function)
except Exception as exc:
    print(f"Weave observability unavailable: {exc}", file=sys.stderr)

    def _observe(function):
        return function
"#;

const OBSERVABILITY_DISABLED: &str = r#"

def _observe(function):
    return function
"#;

/// Renders `flask_app.py` for the given endpoints
pub fn render(endpoints: &[EndpointDescriptor], options: &WrapperOptions) -> String {
    let table: String = endpoints.iter().map(endpoint_literal).collect();
    let observability = if options.observability {
        OBSERVABILITY_ENABLED.replace("@WEAVE_PROJECT@", &py_str(WEAVE_PROJECT))
    } else {
        OBSERVABILITY_DISABLED.to_string()
    };

    TEMPLATE
        .replace("@SERVICE_NAME@", &py_str(&options.service_name))
        .replace("@ENDPOINTS@", &table)
        .replace("@OBSERVABILITY@", &observability)
        .replace("@PORT@", &options.port.to_string())
}

/// Python string literal; JSON string syntax is a subset of Python's
fn py_str(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

fn py_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

fn param_literal(param: &ParameterSpec) -> String {
    format!(
        "{{\"name\": {}, \"type\": {}, \"required\": {}}}",
        py_str(&param.name),
        py_str(param.declared_type.as_str()),
        py_bool(!param.has_default)
    )
}

fn endpoint_literal(endpoint: &EndpointDescriptor) -> String {
    let params: Vec<String> = endpoint.parameters.iter().map(param_literal).collect();
    format!(
        "    {{\"function\": {}, \"method\": {}, \"path\": {}, \"params\": [{}]}},\n",
        py_str(&endpoint.function_name),
        py_str(endpoint.http_method.as_str()),
        py_str(&endpoint.path),
        params.join(", ")
    )
}
