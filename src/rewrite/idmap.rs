use std::collections::HashMap;

use crate::config::MappingRule;

/// 标识符映射表
///
/// 由配置的 (旧 → 新) 标识符对构建的纯查找结构。核心不变量：
/// 未被映射的标识符原样返回，绝不丢弃或置空。
#[derive(Debug, Default, Clone)]
pub struct IdentifierMap {
    entries: HashMap<String, String>,
}

impl IdentifierMap {
    /// 从规则列表构建映射表
    ///
    /// 任一侧为空的畸形规则静默跳过；同一 `old_id` 重复出现时
    /// 后注册者覆盖先注册者（插入顺序即优先级）。
    pub fn build(rules: &[MappingRule]) -> Self {
        let mut entries = HashMap::with_capacity(rules.len());
        for rule in rules {
            if rule.old_id.is_empty() || rule.new_id.is_empty() {
                continue;
            }
            entries.insert(rule.old_id.clone(), rule.new_id.clone());
        }
        Self { entries }
    }

    /// 查找映射值，未命中时恒等回退
    pub fn lookup<'a>(&'a self, id: &'a str) -> &'a str {
        self.entries.get(id).map(String::as_str).unwrap_or(id)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
