// ==========================================
// 保险修复估价系统 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入模块所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use async_trait::async_trait;
use std::error::Error;

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 用途: 价目导入所需的配置读取接口
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait ImportConfigReader: Send + Sync {
    /// 已存在的 item_code 是否覆盖更新
    ///
    /// # 返回
    /// - true: 更新已有价目项（计入 updated）
    /// - false: 跳过（计入 skipped）
    ///
    /// # 默认值
    /// - true
    async fn get_update_existing(&self) -> Result<bool, Box<dyn Error>>;

    /// 导入行未提供损耗率时使用的默认值（百分比）
    ///
    /// # 默认值
    /// - 0
    async fn get_default_waste_factor(&self) -> Result<f64, Box<dyn Error>>;

    /// unit_cost 与三段之和的允许偏差（超出则记警告）
    ///
    /// # 默认值
    /// - 0.005
    async fn get_unit_cost_tolerance(&self) -> Result<f64, Box<dyn Error>>;
}
