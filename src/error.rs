use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 两份预测文件无法对齐
    #[error("输入不匹配: {0}")]
    InputMismatch(#[from] InputMismatchError),
    /// 翻译服务错误
    #[error("翻译服务错误: {0}")]
    Translation(#[from] TranslationServiceError),
    /// 题库不足以拆分
    #[error("题库拆分失败: {0}")]
    InsufficientQuestions(#[from] InsufficientQuestionsError),
    /// 数据库连接/执行错误
    #[error("数据库错误: {0}")]
    Store(#[from] StoreConnectionError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
}

/// 预测文件对齐错误
#[derive(Debug, Error)]
pub enum InputMismatchError {
    /// 没有任何一条记录能对齐
    #[error("无法对齐方法 A/B 的结果文件 ({path_a} / {path_b})，对齐字段: {key_field}")]
    NoAlignedRecords {
        path_a: String,
        path_b: String,
        key_field: String,
    },
}

/// 翻译服务错误
#[derive(Debug, Error)]
pub enum TranslationServiceError {
    /// 请求构造或调用失败
    #[error("翻译请求失败 (模型: {model}): {source}")]
    RequestFailed {
        model: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 单次调用超时
    #[error("翻译请求超时 (模型: {model}, {timeout_secs} 秒)")]
    Timeout { model: String, timeout_secs: u64 },
    /// 返回内容为空
    #[error("翻译服务返回内容为空 (模型: {model})")]
    EmptyContent { model: String },
    /// 重试用尽
    #[error("翻译失败，已重试 {attempts} 次: {last_error}")]
    RetriesExhausted { attempts: usize, last_error: String },
}

/// 题库拆分错误
#[derive(Debug, Error)]
pub enum InsufficientQuestionsError {
    /// m / n 不是正整数
    #[error("m 和 n 必须是正整数 (m={m}, n={n})")]
    InvalidCounts { m: usize, n: usize },
    /// 每题重复次数大于问卷份数
    #[error("n={n} > m={m}，会导致同一份问卷内出现重复题目")]
    RepeatsExceedQuestionnaires { m: usize, n: usize },
    /// 题库为空
    #[error("题库为空")]
    EmptyBank,
    /// 总题量无法整除问卷份数
    #[error("N*n={total} 不能被 m={m} 整除，请调整 m/n")]
    NotDivisible { total: usize, m: usize },
    /// 题目缺少 qid
    #[error("第 {index} 道题缺少有效的 qid")]
    MissingQid { index: usize },
    /// 多次尝试后仍无法得到合法划分
    #[error("尝试 {attempts} 次后仍无法拆分题库，请更换 --seed 或调整 m/n")]
    AttemptsExhausted { attempts: usize },
}

/// 数据库错误
#[derive(Debug, Error)]
pub enum StoreConnectionError {
    /// 缺少密码环境变量
    #[error("缺少数据库密码环境变量: {env}")]
    MissingPassword { env: String },
    /// 连接失败
    #[error("无法连接数据库 {host}:{port}: {source}")]
    ConnectFailed {
        host: String,
        port: u16,
        #[source]
        source: sqlx::Error,
    },
    /// 执行 SQL 失败
    #[error("数据库操作失败 ({operation}): {source}")]
    QueryFailed {
        operation: String,
        #[source]
        source: sqlx::Error,
    },
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 文件不存在
    #[error("文件不存在: {path}")]
    NotFound { path: String },
    /// 目录不存在
    #[error("目录不存在: {path}")]
    DirectoryNotFound { path: String },
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 写入文件失败
    #[error("写入文件失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// JSON / JSONL 解析失败
    #[error("解析失败 ({path} 第 {line} 行): {source}")]
    ParseFailed {
        path: String,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    /// 序列化失败
    #[error("序列化失败 ({path}): {source}")]
    SerializeFailed {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    /// 顶层 JSON 不是数组
    #[error("{path} 是 JSON 但不是数组")]
    NotAList { path: String },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 未知任务名
    #[error("未知任务: {name}（可选: value, mic）")]
    UnknownTask { name: String },
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 流水线配置文件解析失败
    #[error("流水线配置解析失败 ({path}): {source}")]
    PipelineParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    /// 文件名匹配规则无效
    #[error("无效的文件名规则 {pattern}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建文件读取错误
    pub fn file_read_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source,
        })
    }

    /// 创建文件写入错误
    pub fn file_write_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File(FileError::WriteFailed {
            path: path.into(),
            source,
        })
    }

    /// 创建解析错误（行号从 1 开始）
    pub fn parse_failed(path: impl Into<String>, line: usize, source: serde_json::Error) -> Self {
        AppError::File(FileError::ParseFailed {
            path: path.into(),
            line,
            source,
        })
    }

    /// 创建序列化错误
    pub fn serialize_failed(path: impl Into<String>, source: serde_json::Error) -> Self {
        AppError::File(FileError::SerializeFailed {
            path: path.into(),
            source,
        })
    }

    /// 创建数据库操作错误
    pub fn query_failed(operation: impl Into<String>, source: sqlx::Error) -> Self {
        AppError::Store(StoreConnectionError::QueryFailed {
            operation: operation.into(),
            source,
        })
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
