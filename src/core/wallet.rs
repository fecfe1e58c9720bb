//! Browser binding for the injected provider.
//!
//! Talks to `window.ethereum` (or any EIP-1193 object) through direct
//! JavaScript interop via the Reflect API. Values cross the boundary as JSON.

use std::time::Duration;

use async_trait::async_trait;
use js_sys::{Array, Function, Object, Promise, Reflect};
use serde::Serialize;
use serde_json::{Map, Value};
use wasm_bindgen::JsCast;
use wasm_bindgen::JsValue;
use wasm_bindgen::prelude::Closure;
use wasm_bindgen_futures::JsFuture;

use crate::config::PROVIDER_GLOBAL;
use crate::core::error::ProviderError;
use crate::core::provider::{EventHandler, InjectedProvider, ProviderSource};

/// Handle onto an injected provider object.
#[derive(Clone, Debug)]
pub struct WindowProvider {
    object: Object,
}

impl WindowProvider {
    /// Wrap an arbitrary provider object.
    pub fn new(object: Object) -> Self {
        Self { object }
    }

    /// Get the `window.ethereum` object injected by the extension.
    pub fn from_window() -> Option<Self> {
        let window = web_sys::window()?;
        Reflect::get(&window, &PROVIDER_GLOBAL.into())
            .ok()
            .and_then(|v| v.dyn_into::<Object>().ok())
            .map(Self::new)
    }

    pub fn as_object(&self) -> &Object {
        &self.object
    }

    fn function(&self, name: &'static str) -> Result<Function, ProviderError> {
        Reflect::get(&self.object, &name.into())
            .ok()
            .and_then(|v| v.dyn_into::<Function>().ok())
            .ok_or(ProviderError::Unsupported(name))
    }

    /// Build a `{ method, params }` object.
    fn payload(method: &str, params: Option<&Value>) -> Result<Object, ProviderError> {
        let args = Object::new();
        Reflect::set(&args, &"method".into(), &method.into()).map_err(js_error)?;
        if let Some(params) = params {
            Reflect::set(&args, &"params".into(), &to_js(params)?).map_err(js_error)?;
        }
        Ok(args)
    }
}

/// Await a value that may or may not be a thenable.
async fn settle(value: JsValue) -> Result<Value, ProviderError> {
    let resolved = JsFuture::from(Promise::resolve(&value))
        .await
        .map_err(js_error)?;
    from_js(resolved)
}

#[async_trait(?Send)]
impl InjectedProvider for WindowProvider {
    type Listener = Closure<dyn Fn(JsValue)>;

    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, ProviderError> {
        let request = self.function("request")?;
        let args = Self::payload(method, params.as_ref())?;
        let pending = request.call1(&self.object, &args).map_err(js_error)?;
        settle(pending).await
    }

    async fn send(&self, method: &str, params: Option<Value>) -> Result<Value, ProviderError> {
        let send = self.function("send")?;
        let params = match &params {
            Some(params) => to_js(params)?,
            None => Array::new().into(),
        };
        let pending = send
            .call2(&self.object, &method.into(), &params)
            .map_err(js_error)?;
        settle(pending).await
    }

    async fn send_payload(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value, ProviderError> {
        let send = self.function("send")?;
        let payload = Self::payload(method, params.as_ref())?;
        let object = self.object.clone();

        // Resolves from the node-style callback, or from a synchronous return.
        let promise = Promise::new(&mut |resolve, reject| {
            let on_reject = reject.clone();
            let on_resolve = resolve.clone();
            let callback = Closure::once_into_js(move |err: JsValue, result: JsValue| {
                if err.is_null() || err.is_undefined() {
                    let _ = on_resolve.call1(&JsValue::NULL, &result);
                } else {
                    let _ = on_reject.call1(&JsValue::NULL, &err);
                }
            });

            match send.call2(&object, &payload, &callback) {
                Ok(returned) if !returned.is_undefined() => {
                    let _ = resolve.call1(&JsValue::NULL, &returned);
                }
                Ok(_) => {}
                Err(err) => {
                    let _ = reject.call1(&JsValue::NULL, &err);
                }
            }
        });

        settle(promise.into()).await
    }

    async fn enable(&self) -> Result<Value, ProviderError> {
        let enable = self.function("enable")?;
        let pending = enable.call0(&self.object).map_err(js_error)?;
        settle(pending).await
    }

    fn property(&self, path: &[&str]) -> Option<Value> {
        let mut value: JsValue = self.object.clone().into();
        for key in path {
            if !value.is_object() {
                return None;
            }
            value = Reflect::get(&value, &(*key).into()).ok()?;
        }
        if value.is_undefined() || value.is_function() {
            return None;
        }
        from_js(value).ok()
    }

    fn providers(&self) -> Vec<Self> {
        Reflect::get(&self.object, &"providers".into())
            .ok()
            .filter(Array::is_array)
            .map(|list| {
                Array::from(&list)
                    .iter()
                    .filter_map(|entry| entry.dyn_into::<Object>().ok())
                    .map(Self::new)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn is_connected(&self) -> bool {
        self.function("isConnected")
            .ok()
            .and_then(|f| f.call0(&self.object).ok())
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    fn on(&self, event: &str, handler: EventHandler) -> Result<Self::Listener, ProviderError> {
        let on = self.function("on")?;
        let closure = Closure::wrap(Box::new(move |payload: JsValue| {
            handler(event_payload(payload));
        }) as Box<dyn Fn(JsValue)>);

        on.call2(&self.object, &event.into(), closure.as_ref())
            .map_err(js_error)?;
        Ok(closure)
    }

    fn remove_listener(&self, event: &str, listener: &Self::Listener) {
        if let Ok(remove) = self.function("removeListener") {
            let _ = remove.call2(&self.object, &event.into(), listener.as_ref());
        }
    }
}

/// Looks the provider up on `window`, sleeping between polls.
#[derive(Clone, Copy, Debug, Default)]
pub struct WindowSource;

#[async_trait(?Send)]
impl ProviderSource for WindowSource {
    type Provider = WindowProvider;

    fn lookup(&self) -> Option<WindowProvider> {
        WindowProvider::from_window()
    }

    async fn wait(&self, duration: Duration) {
        gloo_timers::future::sleep(duration).await;
    }
}

fn to_js(value: &Value) -> Result<JsValue, ProviderError> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
}

fn from_js(value: JsValue) -> Result<Value, ProviderError> {
    if value.is_undefined() {
        return Ok(Value::Null);
    }
    serde_wasm_bindgen::from_value(value).map_err(|e| ProviderError::InvalidResponse(e.to_string()))
}

/// Read a property that is actually set.
fn field(value: &JsValue, key: &str) -> Option<JsValue> {
    Reflect::get(value, &key.into())
        .ok()
        .filter(|v| !v.is_undefined() && !v.is_null())
}

/// Convert an event payload.
///
/// `Error` objects keep `message` on the prototype chain, out of reach of
/// serde-wasm-bindgen, so they are read field by field.
fn event_payload(value: JsValue) -> Value {
    if !value.is_instance_of::<js_sys::Error>() {
        return from_js(value).unwrap_or(Value::Null);
    }

    let mut payload = Map::new();
    if let Some(code) = field(&value, "code").and_then(|v| v.as_f64()) {
        payload.insert("code".to_string(), Value::from(code as i64));
    }
    if let Some(message) = field(&value, "message").and_then(|v| v.as_string()) {
        payload.insert("message".to_string(), Value::String(message));
    }
    if let Some(data) = field(&value, "data").and_then(|v| from_js(v).ok()) {
        payload.insert("data".to_string(), data);
    }
    Value::Object(payload)
}

/// Convert a thrown JavaScript value into a [`ProviderError`].
fn js_error(err: JsValue) -> ProviderError {
    let code = field(&err, "code").and_then(|v| v.as_f64());
    let message = field(&err, "message").and_then(|v| v.as_string());

    match code {
        Some(code) => ProviderError::Rpc {
            code: code as i64,
            message: message.unwrap_or_default(),
            data: field(&err, "data").and_then(|v| from_js(v).ok()),
        },
        None => ProviderError::Other(
            message
                .or_else(|| err.as_string())
                .unwrap_or_else(|| format!("{:?}", err)),
        ),
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use serde_json::json;
    use wasm_bindgen_test::wasm_bindgen_test;

    use super::*;

    const STUB: &str = r#"
        const listeners = [];
        const rejection = Object.assign(new Error("Unrecognized chain ID"), {
            code: 4902,
            data: { originalError: { code: 4902 } },
        });
        return {
            isMetaMask: true,
            cachedResults: { net_version: { result: "4" } },
            helper: function () {},
            request: ({ method }) =>
                method === "eth_chainId" ? Promise.resolve("0x89") : Promise.reject(rejection),
            send: function (payload, callback) {
                if (typeof callback !== "function") {
                    return Promise.resolve({ result: payload });
                }
                if (payload.method === "net_version") {
                    setTimeout(() => callback(null, { id: 1, jsonrpc: "2.0", result: "0x3" }), 0);
                    return undefined;
                }
                return { id: 1, jsonrpc: "2.0", result: ["0xabc"] };
            },
            isConnected: () => true,
            on: (event, listener) => { listeners.push([event, listener]); },
            removeListener: (event, listener) => {
                const i = listeners.findIndex(([e, l]) => e === event && l === listener);
                if (i >= 0) listeners.splice(i, 1);
            },
            listenerCount: () => listeners.length,
            emit: (event, payload) => {
                for (const [e, l] of listeners.slice()) if (e === event) l(payload);
            },
        };
    "#;

    fn stub() -> WindowProvider {
        let object = Function::new_no_args(STUB)
            .call0(&JsValue::NULL)
            .unwrap()
            .dyn_into::<Object>()
            .unwrap();
        WindowProvider::new(object)
    }

    fn call(provider: &WindowProvider, name: &str, args: &[JsValue]) -> JsValue {
        let function = Reflect::get(provider.as_object(), &name.into())
            .unwrap()
            .dyn_into::<Function>()
            .unwrap();
        let args: Array = args.iter().collect();
        function.apply(provider.as_object(), &args).unwrap()
    }

    #[wasm_bindgen_test]
    async fn test_request_resolves() {
        let provider = stub();
        assert_eq!(
            provider.request("eth_chainId", None).await,
            Ok(json!("0x89"))
        );
    }

    #[wasm_bindgen_test]
    async fn test_rejection_keeps_code_and_data() {
        let err = stub()
            .request("wallet_switchEthereumChain", Some(json!([{ "chainId": "0x1" }])))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ProviderError::Rpc {
                code: 4902,
                message: "Unrecognized chain ID".to_string(),
                data: Some(json!({ "originalError": { "code": 4902 } })),
            }
        );
        assert!(err.is_unrecognized_chain());
    }

    #[wasm_bindgen_test]
    async fn test_legacy_send() {
        let value = stub().send("net_version", None).await.unwrap();
        assert_eq!(value, json!({ "result": "net_version" }));
    }

    #[wasm_bindgen_test]
    async fn test_send_payload_resolves_from_callback() {
        let value = stub().send_payload("net_version", None).await.unwrap();
        assert_eq!(value, json!({ "id": 1, "jsonrpc": "2.0", "result": "0x3" }));
    }

    #[wasm_bindgen_test]
    async fn test_send_payload_resolves_synchronous_answer() {
        let value = stub().send_payload("eth_accounts", None).await.unwrap();
        assert_eq!(value, json!({ "id": 1, "jsonrpc": "2.0", "result": ["0xabc"] }));
    }

    #[wasm_bindgen_test]
    async fn test_missing_entry_point_is_unsupported() {
        assert_eq!(
            stub().enable().await,
            Err(ProviderError::Unsupported("enable"))
        );
    }

    #[wasm_bindgen_test]
    fn test_property_paths() {
        let provider = stub();
        assert_eq!(
            provider.property(&["cachedResults", "net_version", "result"]),
            Some(json!("4"))
        );
        assert_eq!(provider.property(&["isMetaMask"]), Some(json!(true)));
        assert!(provider.has_flag("isMetaMask"));
        assert_eq!(provider.property(&["helper"]), None);
        assert_eq!(provider.property(&["isMetaMask", "nested"]), None);
        assert_eq!(provider.property(&["missing"]), None);
        assert!(provider.is_connected());
        assert!(provider.providers().is_empty());
    }

    #[wasm_bindgen_test]
    fn test_listener_identity() {
        let provider = stub();
        let received = Rc::new(RefCell::new(Vec::new()));
        let handler: EventHandler = {
            let received = Rc::clone(&received);
            Rc::new(move |payload: Value| received.borrow_mut().push(payload))
        };

        let listener = provider.on("chainChanged", handler).unwrap();
        call(&provider, "emit", &["chainChanged".into(), "0x1".into()]);
        assert_eq!(*received.borrow(), vec![json!("0x1")]);

        provider.remove_listener("chainChanged", &listener);
        assert_eq!(
            call(&provider, "listenerCount", &[]).as_f64(),
            Some(0.0)
        );
        call(&provider, "emit", &["chainChanged".into(), "0x2".into()]);
        assert_eq!(received.borrow().len(), 1);
    }

    #[wasm_bindgen_test]
    fn test_error_event_payload_keeps_message() {
        let provider = stub();
        let received = Rc::new(RefCell::new(Vec::new()));
        let handler: EventHandler = {
            let received = Rc::clone(&received);
            Rc::new(move |payload: Value| received.borrow_mut().push(payload))
        };
        let _listener = provider.on("disconnect", handler).unwrap();

        let error = Function::new_no_args(
            "return Object.assign(new Error('Provider disconnected'), { code: 4900 });",
        )
        .call0(&JsValue::NULL)
        .unwrap();
        call(&provider, "emit", &["disconnect".into(), error]);

        let payload = received.borrow()[0].clone();
        assert_eq!(
            payload,
            json!({ "code": 4900, "message": "Provider disconnected" })
        );
        assert_eq!(
            ProviderError::from_value(&payload),
            ProviderError::rpc(4900, "Provider disconnected")
        );
    }
}
