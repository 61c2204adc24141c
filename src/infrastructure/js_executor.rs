//! JS 执行器 - 基础设施层
//!
//! 持有页面句柄，只暴露"在页面里执行 JS"的能力。
//! 字段读取全部通过 XPath 在页面内完成，避免逐个元素往返。

use anyhow::Result;
use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value as JsonValue;

/// JS 执行器
#[derive(Clone)]
pub struct JsExecutor {
    page: Page,
}

impl JsExecutor {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// 执行 JS 代码并返回 JSON 结果
    pub async fn eval(&self, js_code: impl Into<String>) -> Result<JsonValue> {
        let result = self.page.evaluate(js_code.into()).await?;
        let json_value = result.into_value()?;
        Ok(json_value)
    }

    /// 执行 JS 代码并反序列化为指定类型
    pub async fn eval_as<T: DeserializeOwned>(&self, js_code: impl Into<String>) -> Result<T> {
        let json_value = self.eval(js_code).await?;
        let typed_value = serde_json::from_value(json_value)?;
        Ok(typed_value)
    }

    /// 读取 XPath 节点的可见文本；节点不存在时返回 None
    pub async fn xpath_text(&self, xpath: &str) -> Result<Option<String>> {
        let js_code = format!(
            r#"(() => {{
                {}
                if (node === null) {{ return {{ found: false, value: '' }}; }}
                return {{ found: true, value: (node.innerText ?? node.textContent ?? '').trim() }};
            }})()"#,
            locate_node(xpath)?
        );
        let lookup: NodeLookup<String> = self.eval_as(js_code).await?;
        Ok(lookup.into_option())
    }

    /// 读取 XPath 节点下的直接文本子节点（去空白、去空串）
    pub async fn xpath_text_nodes(&self, xpath: &str) -> Result<Option<Vec<String>>> {
        let js_code = format!(
            r#"(() => {{
                {}
                if (node === null) {{ return {{ found: false, value: [] }}; }}
                const texts = [];
                for (const child of node.childNodes) {{
                    if (child.nodeType === Node.TEXT_NODE) {{
                        const text = child.textContent.trim();
                        if (text) {{ texts.push(text); }}
                    }}
                }}
                return {{ found: true, value: texts }};
            }})()"#,
            locate_node(xpath)?
        );
        let lookup: NodeLookup<Vec<String>> = self.eval_as(js_code).await?;
        Ok(lookup.into_option())
    }
}

/// 页面内查找结果；JS 的 null 无法经 CDP 取回，因此统一包一层
#[derive(Debug, Deserialize)]
struct NodeLookup<T> {
    found: bool,
    value: T,
}

impl<T> NodeLookup<T> {
    fn into_option(self) -> Option<T> {
        self.found.then_some(self.value)
    }
}

/// 生成定位节点的 JS 片段，结果存放在 `node` 变量中
fn locate_node(xpath: &str) -> Result<String> {
    Ok(format!(
        "const node = document.evaluate({}, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue;",
        serde_json::to_string(xpath)?
    ))
}
