use std::fmt;

/// 应用程序错误类型
#[derive(Debug)]
pub enum AppError {
    /// 查询门户（浏览器会话）错误
    Portal(PortalError),
    /// 记录存储错误
    Store(StoreError),
    /// 截图文件错误
    Artifact(ArtifactError),
    /// 任务队列错误
    Queue(QueueError),
    /// 配置错误
    Config(ConfigError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Portal(e) => write!(f, "门户错误: {}", e),
            AppError::Store(e) => write!(f, "存储错误: {}", e),
            AppError::Artifact(e) => write!(f, "截图错误: {}", e),
            AppError::Queue(e) => write!(f, "队列错误: {}", e),
            AppError::Config(e) => write!(f, "配置错误: {}", e),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Portal(e) => Some(e),
            AppError::Store(e) => Some(e),
            AppError::Artifact(e) => Some(e),
            AppError::Queue(e) => Some(e),
            AppError::Config(e) => Some(e),
        }
    }
}

/// 门户会话错误
///
/// 这些错误意味着会话无法建立，属于基础设施故障。
#[derive(Debug)]
pub enum PortalError {
    /// 启动或连接浏览器失败
    LaunchFailed {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 创建页面失败
    PageCreationFailed {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 导航失败
    NavigationFailed {
        url: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 页面加载超时
    LoadTimeout { url: String, secs: u64 },
}

impl fmt::Display for PortalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortalError::LaunchFailed { source } => write!(f, "浏览器启动失败: {}", source),
            PortalError::PageCreationFailed { source } => write!(f, "创建页面失败: {}", source),
            PortalError::NavigationFailed { url, source } => {
                write!(f, "导航到 {} 失败: {}", url, source)
            }
            PortalError::LoadTimeout { url, secs } => {
                write!(f, "加载 {} 超时 ({} 秒)", url, secs)
            }
        }
    }
}

impl std::error::Error for PortalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PortalError::LaunchFailed { source }
            | PortalError::PageCreationFailed { source }
            | PortalError::NavigationFailed { source, .. } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            PortalError::LoadTimeout { .. } => None,
        }
    }
}

/// 记录存储错误
#[derive(Debug)]
pub enum StoreError {
    /// 任务不存在
    NotFound { job_id: String },
    /// 任务已存在
    DuplicateJob { job_id: String },
    /// 任务已处于终态，拒绝修改
    AlreadyTerminal { job_id: String, status: String },
    /// 快照读写失败
    PersistFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound { job_id } => write!(f, "任务不存在: {}", job_id),
            StoreError::DuplicateJob { job_id } => write!(f, "任务已存在: {}", job_id),
            StoreError::AlreadyTerminal { job_id, status } => {
                write!(f, "任务 {} 已处于终态 {}，不可修改", job_id, status)
            }
            StoreError::PersistFailed { path, source } => {
                write!(f, "写入记录快照失败 ({}): {}", path, source)
            }
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::PersistFailed { source, .. } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            _ => None,
        }
    }
}

/// 截图文件错误
#[derive(Debug)]
pub enum ArtifactError {
    /// 文件已存在（截图只写一次）
    AlreadyExists { path: String },
    /// 创建目录失败
    DirectoryCreateFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 写入文件失败
    WriteFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl fmt::Display for ArtifactError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactError::AlreadyExists { path } => write!(f, "截图文件已存在: {}", path),
            ArtifactError::DirectoryCreateFailed { path, source } => {
                write!(f, "创建目录失败 ({}): {}", path, source)
            }
            ArtifactError::WriteFailed { path, source } => {
                write!(f, "写入截图失败 ({}): {}", path, source)
            }
        }
    }
}

impl std::error::Error for ArtifactError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ArtifactError::DirectoryCreateFailed { source, .. }
            | ArtifactError::WriteFailed { source, .. } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            ArtifactError::AlreadyExists { .. } => None,
        }
    }
}

/// 任务队列错误
#[derive(Debug)]
pub enum QueueError {
    /// 查询编号不合法
    InvalidQueryKey { reason: String },
    /// 队列已关闭
    Closed,
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueError::InvalidQueryKey { reason } => write!(f, "查询编号不合法: {}", reason),
            QueueError::Closed => write!(f, "任务队列已关闭"),
        }
    }
}

impl std::error::Error for QueueError {}

/// 配置错误
#[derive(Debug)]
pub enum ConfigError {
    /// 取值不合法
    InvalidValue {
        name: String,
        value: String,
        expected: String,
    },
    /// 配置文件解析失败
    FileParseFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidValue {
                name,
                value,
                expected,
            } => {
                write!(f, "配置项 {} 的值 '{}' 不合法，应为 {}", name, value, expected)
            }
            ConfigError::FileParseFailed { path, source } => {
                write!(f, "配置文件解析失败 ({}): {}", path, source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::FileParseFailed { source, .. } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            ConfigError::InvalidValue { .. } => None,
        }
    }
}

// ========== 从常见错误类型转换 ==========

impl From<PortalError> for AppError {
    fn from(err: PortalError) -> Self {
        AppError::Portal(err)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Store(err)
    }
}

impl From<ArtifactError> for AppError {
    fn from(err: ArtifactError) -> Self {
        AppError::Artifact(err)
    }
}

impl From<QueueError> for AppError {
    fn from(err: QueueError) -> Self {
        AppError::Queue(err)
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建配置文件读取错误
    pub fn file_read_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Config(ConfigError::FileParseFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }

    /// 创建快照持久化错误
    pub fn persist_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Store(StoreError::PersistFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }

    /// 创建查询编号校验错误
    pub fn invalid_query_key(reason: impl Into<String>) -> Self {
        AppError::Queue(QueueError::InvalidQueryKey {
            reason: reason.into(),
        })
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
