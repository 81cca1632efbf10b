//! 全局常量定义

/// 配置文件相关常量
pub mod config {
    /// 用户目录下的配置目录名
    pub const DIR_NAME: &str = ".ab";

    /// 配置文件名
    pub const FILE_NAME: &str = "config.json";

    /// `init --force` 的备份后缀
    pub const BACKUP_SUFFIX: &str = "bak";

    /// 当前支持的配置文档版本
    pub const VERSION: &str = "1.0";

    /// 环境变量层前缀（`AB__GLOBAL__LANGUAGE`）
    pub const ENV_PREFIX: &str = "AB";

    /// 环境变量层嵌套分隔符
    pub const ENV_SEPARATOR: &str = "__";

    /// 允许 `set` 写入的顶层 section
    pub const SECTIONS: &[&str] = &["global", "models", "commands", "history"];
}

/// LLM 相关常量
pub mod llm {
    /// 字符数 / token 数的近似比例
    pub const CHARS_PER_TOKEN: usize = 4;

    /// Chat completions 路径后缀
    pub const CHAT_COMPLETIONS_SUFFIX: &str = "/chat/completions";

    /// 模型列表路径后缀
    pub const MODELS_SUFFIX: &str = "/models";

    /// 分支名建议的 completion 上限
    pub const BRANCH_NAME_MAX_COMPLETION: u32 = 100;
}

/// 历史记录相关常量
pub mod history {
    /// 保留的历史文件数量
    pub const KEEP_LAST: usize = 100;

    /// 索引文件名
    pub const INDEX_FILE: &str = "index.json";

    /// 历史文件前缀
    pub const FILE_PREFIX: &str = "history_";

    /// 响应预览长度
    pub const PREVIEW_CHARS: usize = 500;
}

/// Git 相关常量
pub mod git {
    /// 受保护的分支（auto-commit 会建议新建分支）
    pub const PROTECTED_BRANCHES: &[&str] = &["master", "main", "develop", "development"];

    /// 自动检测 base 分支的候选顺序
    pub const BASE_BRANCH_CANDIDATES: &[&str] = &["main", "master", "develop"];

    /// 分支名最大长度
    pub const MAX_BRANCH_NAME_LEN: usize = 50;

    /// 作为风格参考的最近 commit 数
    pub const RECENT_COMMITS: usize = 5;

    /// 分支名建议时附带的 diff 预览长度
    pub const BRANCH_DIFF_PREVIEW: usize = 1000;

    /// 冲突块前后的上下文行数
    pub const CONFLICT_CONTEXT_LINES: usize = 10;

    /// 没有 tag 时 changelog 回溯的 commit 数
    pub const CHANGELOG_FALLBACK_DEPTH: usize = 50;

    /// rewrite-history 默认回溯的 commit 数
    pub const REWRITE_DEFAULT_DEPTH: usize = 10;

    /// 少于该词数的 commit message 视为需要重写
    pub const MIN_MESSAGE_WORDS: usize = 3;

    /// rewrite-history 每个 commit 附带的 diff 长度
    pub const REWRITE_DIFF_PREVIEW: usize = 4000;

    /// KEEP/REWRITE 分类的 completion 上限
    pub const CLASSIFICATION_MAX_COMPLETION: u32 = 10;

    /// 备份分支前缀
    pub const BACKUP_BRANCH_PREFIX: &str = "backup/pre-rewrite-";
}

/// explain 相关常量
pub mod explain {
    /// 聚焦行前后的上下文行数
    pub const CONTEXT_LINES: usize = 10;

    /// 整文件读取的行数上限
    pub const MAX_FILE_LINES: usize = 200;

    /// 自动读取的错误引用文件数上限
    pub const MAX_REFERENCED_FILES: usize = 3;

    /// 错误输入自动附带的 bash history 行数
    pub const ERROR_HISTORY_LINES: usize = 10;
}

/// 上下文组装相关常量
pub mod context {
    /// ignore 文件名
    pub const IGNORE_FILE: &str = ".aiignore";

    /// 二进制检测读取的字节数
    pub const BINARY_SNIFF_BYTES: usize = 8192;

    /// 非文本字节比例阈值（百分比）
    pub const BINARY_THRESHOLD_PERCENT: usize = 30;
}
