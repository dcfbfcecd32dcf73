use std::fmt;

/// 载荷摘要策略
///
/// 载荷以 `Debug` 格式渲染。超过上限的摘要在字符边界处截断，
/// 并附带被截断的字节数。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadPolicy {
    enabled: bool,
    limit: Option<usize>,
}

pub const DEFAULT_PAYLOAD_LIMIT: usize = 4096;

impl PayloadPolicy {
    /// 不记录载荷
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            limit: None,
        }
    }

    /// 原样记录载荷，不限制长度
    pub fn unbounded() -> Self {
        Self {
            enabled: true,
            limit: None,
        }
    }

    pub fn bounded(limit: usize) -> Self {
        Self {
            enabled: true,
            limit: Some(limit),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// 渲染载荷摘要，策略禁用时返回 `None`
    pub fn render<T: fmt::Debug + ?Sized>(&self, payload: &T) -> Option<String> {
        if !self.enabled {
            return None;
        }
        let rendered = format!("{:?}", payload);
        Some(match self.limit {
            Some(limit) if rendered.len() > limit => truncate(&rendered, limit),
            _ => rendered,
        })
    }
}

impl Default for PayloadPolicy {
    fn default() -> Self {
        Self::bounded(DEFAULT_PAYLOAD_LIMIT)
    }
}

fn truncate(rendered: &str, limit: usize) -> String {
    let mut cut = limit;
    while !rendered.is_char_boundary(cut) {
        cut -= 1;
    }
    format!(
        "{}… ({} bytes truncated)",
        &rendered[..cut],
        rendered.len() - cut
    )
}
