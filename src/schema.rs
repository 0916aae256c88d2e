//! Worksheet labels, header names and cell vocabulary of the portal workbook.
//!
//! Every table is addressed by worksheet label and header name, never by
//! position, except for the two review ledgers whose rows are written in a
//! fixed column order (see [`graded::HEADERS`] and [`rejected::HEADERS`]).

pub const SUBMISSION_ID: &str = "Submission ID";

/// Primary submission intake, appended to by the external form.
pub mod submissions {
    pub const WORKSHEET: &str = "(탈리)과제제출";
    pub const ID: &str = super::SUBMISSION_ID;
    pub const SUBMITTED_AT: &str = "Submitted at";
    pub const STUDENT_NAME: &str = "이름을 입력해주세요. (띄어쓰기 금지)";
    pub const CLASS_NAME: &str = "클래스를 선택해주세요.";
    pub const ASSIGNMENT: &str = "과제 번호를 선택해주세요. (반드시 확인요망)";
    pub const STATUS: &str = "제출상태";
    pub const REVIEW_STATUS: &str = "교사확인상태";
    pub const STUDENT_ID: &str = "학생ID";
    /// Column added by the submission feed in place of `Submitted at`.
    pub const LOCAL_TIME: &str = "제출일시_KST_str";
}

pub mod deadlines {
    pub const WORKSHEET: &str = "제출기한";
    pub const CLASS_NAME: &str = "클래스";
    pub const ASSIGNMENT: &str = "과제명";
    pub const DEADLINE_TEXT: &str = "제출기한";
}

pub mod assignments {
    pub const WORKSHEET: &str = "과제목록";
}

pub mod roster {
    pub const WORKSHEET: &str = "(통합) 학생DB";
    pub const STUDENT_ID: &str = "학생ID";
    pub const STUDENT_NAME: &str = "학생이름";
    pub const CLASS_NAME: &str = "클래스";
    pub const PHONE: &str = "학생전화";
    pub const PARENT_PHONE: &str = "학부모전화";
    pub const ENROLLMENT: &str = "재원상태";
    pub const LEVEL: &str = "레벨";
}

/// Graded ledger: columns A..J in this order.
pub mod graded {
    pub const WORKSHEET: &str = "과제제출현황";
    pub const CLASS_NAME: &str = "클래스";
    pub const STUDENT_NAME: &str = "학생이름";
    pub const ASSIGNMENT: &str = "과제명";
    pub const STATUS: &str = "제출상태";
    pub const TOTAL_PROBLEMS: &str = "총문항수";
    pub const WRONG_COUNT: &str = "오답수";
    pub const WRONG_TEXTS: &str = "오답문항";
    pub const MEMO: &str = "메모";
    pub const PROCESSED_AT: &str = "처리일시";
    pub const ID: &str = super::SUBMISSION_ID;

    pub const HEADERS: [&str; 10] = [
        CLASS_NAME,
        STUDENT_NAME,
        ASSIGNMENT,
        STATUS,
        TOTAL_PROBLEMS,
        WRONG_COUNT,
        WRONG_TEXTS,
        MEMO,
        PROCESSED_AT,
        ID,
    ];
}

/// Rejected ledger: columns A..F in this order.
pub mod rejected {
    pub const WORKSHEET: &str = "과제반려현황";
    pub const CLASS_NAME: &str = "클래스";
    pub const STUDENT_NAME: &str = "학생이름";
    pub const ASSIGNMENT: &str = "과제명";
    pub const REASON: &str = "반려사유";
    pub const PROCESSED_AT: &str = "처리일시";
    pub const ID: &str = super::SUBMISSION_ID;

    pub const HEADERS: [&str; 6] = [CLASS_NAME, STUDENT_NAME, ASSIGNMENT, REASON, PROCESSED_AT, ID];
}

pub mod missing {
    pub const WORKSHEET: &str = "미제출현황";
    pub const CLASS_NAME: &str = "클래스";
    pub const STUDENT_NAME: &str = "학생이름";
    pub const ASSIGNMENT: &str = "과제명";
}

pub mod attendance {
    pub const WORKSHEET: &str = "출결";
}

pub mod clinic {
    pub const WORKSHEET: &str = "클리닉";
}

/// Student-keyed side tables (attendance, clinic) share these headers.
pub const SIDE_TABLE_CLASS: &str = "클래스";
pub const SIDE_TABLE_STUDENT: &str = "학생이름";

pub const ON_TIME: &str = "정상제출";
pub const LATE: &str = "지각제출";
pub const UNCONFIRMED: &str = "미확인";
pub const CONFIRMED: &str = "확인완료";
pub const REJECTED: &str = "반려";
pub const ENROLLED: &str = "재원";

/// Timestamp layout written into ledger `처리일시` cells and feed views.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
