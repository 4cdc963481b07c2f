//! The `uri` task module: interacts with web services over HTTP.

use crate::error::{Error, Result};
use crate::modules::{self, TaskModule};
use crate::omap::{OrderedMap, Value};
use crate::schema::{self, field, DefaultVal, FieldDef, ParamSchema, SchemaError};
use crate::value::TValue;
use crate::vars::VarMap;

#[derive(Default)]
pub struct Uri {
    params: Params,
}

#[derive(Default, Clone)]
struct Params {
    /// HTTP or HTTPS URL in the form (http|https)://host.domain[:port]/path.
    url: TValue,
    /// The HTTP method of the request.
    method: TValue,
    /// Whether the module should follow redirects.
    follow_redirects: TValue,
    /// The socket level timeout in seconds.
    timeout: TValue,
    /// Numeric HTTP status codes that signify success of the request.
    status_code: TValue,
}

impl ParamSchema for Params {
    fn fields() -> &'static [FieldDef<Self>] {
        static FIELDS: &[FieldDef<Params>] = &[
            field::<Params>("url", |p, v| p.url = v, |p| p.url.clone()).required(),
            field::<Params>("method", |p, v| p.method = v, |p| p.method.clone())
                .default(DefaultVal::Str("GET")),
            field::<Params>(
                "follow_redirects",
                |p, v| p.follow_redirects = v,
                |p| p.follow_redirects.clone(),
            )
            .default(DefaultVal::Str("safe"))
            .choices(&["all", "none", "safe", "urllib2"]),
            field::<Params>("timeout", |p, v| p.timeout = v, |p| p.timeout.clone()),
            field::<Params>(
                "status_code",
                |p, v| p.status_code = v,
                |p| p.status_code.clone(),
            ),
        ];
        FIELDS
    }
}

impl TaskModule for Uri {
    fn name(&self) -> &'static str {
        "uri"
    }

    fn set_data(&mut self, data: &mut OrderedMap) -> std::result::Result<(), SchemaError> {
        let mut fmap = modules::pop_module_map(data, "uri")?;
        schema::set_data(&mut self.params, &mut fmap)
    }

    fn get_data(&self) -> OrderedMap {
        let mut data = OrderedMap::new();
        data.set("uri", schema::get_data(&self.params));
        data
    }

    fn run(&mut self, vars: &VarMap) -> Result<OrderedMap> {
        let params = modules::resolve_params(&self.params, vars)?;

        let url = params
            .url
            .as_str()
            .ok_or_else(|| Error::module_execution("uri", "no url to request"))?
            .to_string();
        let method = params.method.as_str().unwrap_or("GET").to_uppercase();

        let mut builder = reqwest::blocking::Client::builder();
        if let Some(seconds) = params.timeout.as_int() {
            builder = builder.timeout(std::time::Duration::from_secs(seconds.max(0) as u64));
        }
        if params.follow_redirects.as_str() == Some("none") {
            builder = builder.redirect(reqwest::redirect::Policy::none());
        }
        let client = builder
            .build()
            .map_err(|e| Error::module_execution("uri", e.to_string()))?;

        let method = reqwest::Method::from_bytes(method.as_bytes())
            .map_err(|_| Error::module_execution("uri", format!("invalid method '{}'", method)))?;
        tracing::debug!(%url, "requesting");
        let response = client
            .request(method, &url)
            .send()
            .map_err(|e| Error::module_execution("uri", e.to_string()))?;

        let status = response.status().as_u16() as i64;
        let accepted = match params.status_code.as_string_list() {
            Some(codes) if !codes.is_empty() => {
                codes.iter().any(|c| c.parse::<i64>() == Ok(status))
            }
            _ => (200..400).contains(&status),
        };
        if !accepted {
            return Err(Error::module_execution(
                "uri",
                format!("status code {} was not expected for {}", status, url),
            ));
        }

        let body = response.text().unwrap_or_default();
        let mut out = OrderedMap::new();
        out.set("url", url);
        out.set("status", Value::Int(status));
        // A JSON answer is exposed decoded alongside the raw body.
        if let Ok(decoded) = serde_json::from_str::<Value>(&body) {
            if !decoded.is_null() {
                out.set("json", decoded);
            }
        }
        out.set("content", body);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_is_required() {
        let mut module = Uri::default();
        let mut data: OrderedMap = serde_yaml::from_str("uri:\n  method: POST").unwrap();
        let err = module.set_data(&mut data).unwrap_err();
        assert!(err.to_string().contains("url"), "{}", err);
    }

    #[test]
    fn follow_redirects_validates_membership() {
        let mut module = Uri::default();
        let mut data: OrderedMap =
            serde_yaml::from_str("uri:\n  url: http://example.com\n  follow_redirects: maybe")
                .unwrap();
        assert!(module.set_data(&mut data).is_err());
    }
}
